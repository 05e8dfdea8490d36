use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    HelpMessage,
    ServiceReady,
    GoodBye,
    Ok,
    StartMailInput,
    Unavailable,
    ActionUnavailable,
    SyntaxError,
    ParameterSyntax,
    NotImplemented,
    InvalidCommandSequence,
    ExceededStorage,
    TransactionFailed,
    Unknown(u32),
}

impl Status {
    /// Checks if the status is a permanent rejection
    pub fn is_permanent(self) -> bool {
        u32::from(self) >= 500
    }

    /// Checks if the status is a temporary rejection
    pub fn is_temporary(self) -> bool {
        (400..500).contains(&u32::from(self))
    }
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            214 => Self::HelpMessage,
            220 => Self::ServiceReady,
            221 => Self::GoodBye,
            250 => Self::Ok,
            354 => Self::StartMailInput,
            421 => Self::Unavailable,
            451 => Self::ActionUnavailable,
            500 => Self::SyntaxError,
            501 => Self::ParameterSyntax,
            502 => Self::NotImplemented,
            503 => Self::InvalidCommandSequence,
            552 => Self::ExceededStorage,
            554 => Self::TransactionFailed,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        match value {
            Status::HelpMessage => 214,
            Status::ServiceReady => 220,
            Status::GoodBye => 221,
            Status::Ok => 250,
            Status::StartMailInput => 354,
            Status::Unavailable => 421,
            Status::ActionUnavailable => 451,
            Status::SyntaxError => 500,
            Status::ParameterSyntax => 501,
            Status::NotImplemented => 502,
            Status::InvalidCommandSequence => 503,
            Status::ExceededStorage => 552,
            Status::TransactionFailed => 554,
            Status::Unknown(v) => v,
        }
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}

/// RFC 3463 enhanced status code, e.g. `4.5.1`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EnhancedCode {
    pub class: u8,
    pub subject: u16,
    pub detail: u16,
}

impl EnhancedCode {
    pub const fn new(class: u8, subject: u16, detail: u16) -> Self {
        Self {
            class,
            subject,
            detail,
        }
    }
}

impl Display for EnhancedCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}

/// A single-line reply sent back to the submitting client
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Reply {
    pub status: Status,
    pub enhanced: Option<EnhancedCode>,
    pub message: Cow<'static, str>,
}

impl Reply {
    pub fn new(status: Status, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            enhanced: None,
            message: message.into(),
        }
    }

    pub fn enhanced(
        status: Status,
        enhanced: EnhancedCode,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            status,
            enhanced: Some(enhanced),
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.status.is_permanent()
    }

    pub fn is_temporary(&self) -> bool {
        self.status.is_temporary()
    }

    /// `250 2.0.0 Ok: queued`
    pub fn queued() -> Self {
        Self::enhanced(Status::Ok, EnhancedCode::new(2, 0, 0), "Ok: queued")
    }

    /// `554 5.5.1 Error: no valid recipients`
    pub fn no_valid_recipients() -> Self {
        Self::enhanced(
            Status::TransactionFailed,
            EnhancedCode::new(5, 5, 1),
            "Error: no valid recipients",
        )
    }

    /// `554 5.5.1 Error: maximum message size exceeded`
    pub fn message_too_large() -> Self {
        Self::enhanced(
            Status::TransactionFailed,
            EnhancedCode::new(5, 5, 1),
            "Error: maximum message size exceeded",
        )
    }

    /// `451 4.5.1 Temporary server error. Please try again later`
    pub fn temporary_failure() -> Self {
        Self::enhanced(
            Status::ActionUnavailable,
            EnhancedCode::new(4, 5, 1),
            "Temporary server error. Please try again later",
        )
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.enhanced {
            Some(enhanced) => write!(f, "{} {enhanced} {}", self.status, self.message),
            None => write!(f, "{} {}", self.status, self.message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status() {
        assert!(Status::TransactionFailed.is_permanent());
        assert!(!Status::TransactionFailed.is_temporary());

        assert!(Status::ActionUnavailable.is_temporary());
        assert!(!Status::ActionUnavailable.is_permanent());

        assert_eq!(Status::from(554), Status::TransactionFailed);
        assert_eq!(u32::from(Status::ExceededStorage), 552);
        assert_eq!(Status::from(299), Status::Unknown(299));
    }

    #[test]
    fn reply_lines() {
        assert_eq!(Reply::queued().to_string(), "250 2.0.0 Ok: queued");
        assert_eq!(
            Reply::no_valid_recipients().to_string(),
            "554 5.5.1 Error: no valid recipients"
        );
        assert_eq!(
            Reply::message_too_large().to_string(),
            "554 5.5.1 Error: maximum message size exceeded"
        );
        assert_eq!(
            Reply::temporary_failure().to_string(),
            "451 4.5.1 Temporary server error. Please try again later"
        );
        assert_eq!(Reply::new(Status::GoodBye, "Bye").to_string(), "221 Bye");
    }

    #[test]
    fn reply_classification() {
        assert!(Reply::no_valid_recipients().is_permanent());
        assert!(Reply::temporary_failure().is_temporary());
        assert!(!Reply::queued().is_permanent());
        assert!(!Reply::queued().is_temporary());
    }
}
