use std::fmt;

use crate::models::PodStatus;

/// A disagreement between the two inventories, shown in the NOTE column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Attached to more than one server at once
    MultipleAttachments,
    /// The mounting pod runs on a node that is not the cinder attachment
    PodNotOnCinderServer,
    /// The mounting pod runs on a node nova does not attach the volume to
    PodNotOnNovaServer,
    /// Nova and cinder disagree on the attached server
    NovaCinderMismatch,
    AvailableButAttached,
    AvailableButPod(PodStatus),
    InUseButNotAttached,
    /// Cinder names a server that no longer exists
    AttachedServerNotFound,
    /// Dynamically provisioned volume no claim refers to anymore
    OrphanedKubernetesDisk,
    NoServiceForPort(u16),
    ListenerWithoutMembers,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::MultipleAttachments => f.write_str("multiple attachments"),
            Anomaly::PodNotOnCinderServer => f.write_str("pod != cinder server"),
            Anomaly::PodNotOnNovaServer => f.write_str("pod != nova server"),
            Anomaly::NovaCinderMismatch => f.write_str("nova != cinder server"),
            Anomaly::AvailableButAttached => f.write_str("available but attached"),
            Anomaly::AvailableButPod(status) => write!(f, "available but pod \"{status}\""),
            Anomaly::InUseButNotAttached => f.write_str("in-use but not attached"),
            Anomaly::AttachedServerNotFound => f.write_str("attached server not found"),
            Anomaly::OrphanedKubernetesDisk => f.write_str("kubernetes disk has no pv/pvc/pod"),
            Anomaly::NoServiceForPort(port) => write!(f, "no service for port {port}"),
            Anomaly::ListenerWithoutMembers => f.write_str("listener has no members"),
        }
    }
}

/// Anomalies of one row, in detection order and without repeats
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notes(Vec<Anomaly>);

impl Notes {
    pub fn push(&mut self, anomaly: Anomaly) {
        if !self.0.contains(&anomaly) {
            self.0.push(anomaly);
        }
    }

    pub fn contains(&self, anomaly: &Anomaly) -> bool {
        self.0.contains(anomaly)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anomaly> {
        self.0.iter()
    }
}

impl fmt::Display for Notes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, anomaly) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{anomaly}")?;
        }
        Ok(())
    }
}

impl FromIterator<Anomaly> for Notes {
    fn from_iter<T: IntoIterator<Item = Anomaly>>(iter: T) -> Self {
        let mut notes = Notes::default();
        for anomaly in iter {
            notes.push(anomaly);
        }
        notes
    }
}
