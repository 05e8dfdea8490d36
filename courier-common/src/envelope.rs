/// One logical mail transaction, as handed to the send pipeline.
///
/// Recipients keep the order in which they were accepted and are not
/// deduplicated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: String,
    recipients: Vec<String>,
    data: Vec<u8>,
    configuration_set: Option<String>,
}

impl Envelope {
    pub fn new(
        sender: impl Into<String>,
        recipients: Vec<String>,
        data: Vec<u8>,
        configuration_set: Option<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            data,
            configuration_set,
        }
    }

    #[inline]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    #[inline]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Raw message bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn configuration_set(&self) -> Option<&str> {
        self.configuration_set.as_deref()
    }
}
