//! Schema classification: partitions a record into numeric and string
//! field groups and fingerprints each group's shape.
//!
//! A group's fingerprint is its tag plus its ordered field names. Two records
//! produce equal fingerprints iff a stream built for one can carry the other
//! unchanged.

use crate::record::{Record, Scalar};
use crate::sink::{ChannelFormat, Sample};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two field groups a record is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Numeric,
    Text,
}

impl GroupKind {
    pub const ALL: [GroupKind; 2] = [GroupKind::Numeric, GroupKind::Text];

    /// Value type of a stream carrying this group.
    pub fn format(self) -> ChannelFormat {
        match self {
            GroupKind::Numeric => ChannelFormat::Double64,
            GroupKind::Text => ChannelFormat::String,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Numeric => write!(f, "numeric"),
            GroupKind::Text => write!(f, "string"),
        }
    }
}

/// Shape of a field group. Only ever compared, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint {
    kind: GroupKind,
    names: Vec<String>,
}

impl SchemaFingerprint {
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn channel_count(&self) -> usize {
        self.names.len()
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.names.join(","))
    }
}

/// The fields of one record that belong to one group, in record order.
#[derive(Debug, Clone)]
pub struct FieldGroup<'r> {
    kind: GroupKind,
    fields: Vec<(&'r str, &'r Scalar)>,
}

impl<'r> FieldGroup<'r> {
    fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'r str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn fingerprint(&self) -> SchemaFingerprint {
        SchemaFingerprint {
            kind: self.kind,
            names: self.names().map(String::from).collect(),
        }
    }

    /// Compare against a stored fingerprint without allocating.
    pub fn matches(&self, fp: &SchemaFingerprint) -> bool {
        fp.kind == self.kind
            && fp.names.len() == self.fields.len()
            && fp.names.iter().zip(self.names()).all(|(a, b)| a == b)
    }

    /// The values of this group as one sample, in group order.
    pub fn sample(&self) -> Sample {
        match self.kind {
            GroupKind::Numeric => Sample::Numeric(
                self.fields
                    .iter()
                    .map(|(_, v)| v.as_f64().unwrap_or_default())
                    .collect(),
            ),
            GroupKind::Text => {
                Sample::Text(self.fields.iter().map(|(_, v)| v.to_text()).collect())
            }
        }
    }
}

/// A record split into its two groups.
#[derive(Debug, Clone)]
pub struct Classified<'r> {
    pub numeric: FieldGroup<'r>,
    pub text: FieldGroup<'r>,
}

impl<'r> Classified<'r> {
    pub fn group(&self, kind: GroupKind) -> &FieldGroup<'r> {
        match kind {
            GroupKind::Numeric => &self.numeric,
            GroupKind::Text => &self.text,
        }
    }

    /// Channels needed across both groups.
    pub fn total_channels(&self) -> usize {
        self.numeric.len() + self.text.len()
    }
}

/// Partition a record's fields. O(fields); nothing is cached between records.
pub fn classify(record: &Record) -> Classified<'_> {
    let mut numeric = FieldGroup::new(GroupKind::Numeric);
    let mut text = FieldGroup::new(GroupKind::Text);
    for (name, value) in record.iter() {
        let scalar = value.scalar();
        if scalar.is_number() {
            numeric.fields.push((name, scalar));
        } else {
            text.fields.push((name, scalar));
        }
    }
    Classified { numeric, text }
}
