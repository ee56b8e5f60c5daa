use crate::message::name::{MAX_LABEL_LEN, Name};
use shared::error::{Error, Result};

const LOCAL_DOMAIN: &str = "local";

/// The host identity a responder advertises.
///
/// Keeps the sanitized base name and the conflict counter, and derives from
/// them the host label (`mydevice-2`), the human-readable form used as the
/// service instance label (`mydevice 2`), and the fully-qualified host name
/// (`mydevice-2.local`). All three are regenerated together by
/// [`HostName::bump`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct HostName {
    base: String,
    conflicts: u32,
    label: String,
    instance: String,
    fqdn: Name,
}

impl HostName {
    pub(crate) fn new(base: &str) -> Result<Self> {
        if base.is_empty() {
            return Err(Error::ErrHostnameEmpty);
        }
        if base.len() > MAX_LABEL_LEN {
            return Err(Error::ErrLabelTooLong);
        }
        let base: String = base
            .bytes()
            .map(|b| {
                if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
                    b as char
                } else {
                    '-'
                }
            })
            .collect();

        let mut host = HostName {
            base,
            conflicts: 0,
            label: String::new(),
            instance: String::new(),
            fqdn: Name::default(),
        };
        host.regenerate()?;
        Ok(host)
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn instance(&self) -> &str {
        &self.instance
    }

    pub(crate) fn fqdn(&self) -> &Name {
        &self.fqdn
    }

    pub(crate) fn conflicts(&self) -> u32 {
        self.conflicts
    }

    /// Moves on to the next name after a conflict.
    pub(crate) fn bump(&mut self) -> Result<()> {
        let previous = self.conflicts;
        self.conflicts = self.conflicts.saturating_add(1);
        self.regenerate().inspect_err(|_| self.conflicts = previous)
    }

    fn regenerate(&mut self) -> Result<()> {
        let (label, instance) = if self.conflicts == 0 {
            (self.base.clone(), self.base.clone())
        } else {
            let n = self.conflicts + 1;
            let suffix_len = format!("-{n}").len();
            let base = &self.base[..self.base.len().min(MAX_LABEL_LEN - suffix_len)];
            (format!("{base}-{n}"), format!("{base} {n}"))
        };
        let fqdn = Name::new(&format!("{label}.{LOCAL_DOMAIN}"))?;
        self.label = label;
        self.instance = instance;
        self.fqdn = fqdn;
        Ok(())
    }
}
