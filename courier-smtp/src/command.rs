use core::fmt::{self, Display, Formatter};

use ahash::AHashMap;
use mailparse::MailAddr;

/// ESMTP parameters of a MAIL FROM command (RFC 5321 Section 3.3).
///
/// Keys are case-insensitive and stored upper-cased.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct MailParameters {
    params: AHashMap<String, Option<String>>,
}

impl MailParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses parameter tokens in the form `KEY=VALUE` or `FLAG`.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter appears more than once, or SIZE is
    /// not a positive integer.
    pub fn from_params_str(params_str: &str) -> Result<Self, String> {
        let mut params = Self::new();

        for token in params_str.split_whitespace() {
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key.to_ascii_uppercase(), Some(value.to_string())),
                None => (token.to_ascii_uppercase(), None),
            };

            if params.params.contains_key(&key) {
                return Err(format!("Duplicate parameter '{key}' not allowed"));
            }

            if key == "SIZE" {
                match value.as_deref().map(str::parse::<usize>) {
                    Some(Ok(0)) => return Err(String::from("SIZE=0 is not allowed")),
                    Some(Ok(_)) => {}
                    _ => {
                        return Err(format!(
                            "Invalid SIZE value: {}",
                            value.unwrap_or_default()
                        ));
                    }
                }
            }

            params.params.insert(key, value);
        }

        Ok(params)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_uppercase())?.as_deref()
    }

    /// The declared message size, if the client sent one (RFC 1870)
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.get("SIZE")?.parse().ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Display for MailParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.params {
            if !first {
                f.write_str(" ")?;
            }
            first = false;

            match v {
                None => f.write_str(k)?,
                Some(val) => write!(f, "{k}={val}")?,
            }
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Command {
    Helo(HeloVariant),
    /// `None` is the null reverse-path `<>` from RFC 5321.
    MailFrom(Option<String>, MailParameters),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Help,
    Quit,
    /// A known command with unusable arguments
    Invalid(String),
    /// Not a command this server implements
    Unknown(String),
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(v @ (HeloVariant::Ehlo(id) | HeloVariant::Helo(id))) => {
                write!(fmt, "{v} {id}")
            }
            Self::MailFrom(from, params) => {
                let from = from.as_deref().unwrap_or_default();
                if params.is_empty() {
                    write!(fmt, "MAIL FROM:<{from}>")
                } else {
                    write!(fmt, "MAIL FROM:<{from}> {params}")
                }
            }
            Self::RcptTo(rcpt) => write!(fmt, "RCPT TO:<{rcpt}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Help => fmt.write_str("HELP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) | Self::Unknown(s) => fmt.write_str(s),
        }
    }
}

/// Extract exactly one mailbox from a path such as `<user@example.com>`
fn single_address(path: &str) -> Result<String, Command> {
    let addresses = mailparse::addrparse(path).map_err(|e| Command::Invalid(e.to_string()))?;

    match addresses.first() {
        Some(MailAddr::Single(info)) if addresses.len() == 1 => Ok(info.addr.clone()),
        _ => Err(Command::Invalid(format!("Expected a single address in {path}"))),
    }
}

fn has_prefix(command: &str, prefix: &str) -> bool {
    command.len() >= prefix.len()
        && command
            .get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let trimmed = command.trim();

        if has_prefix(trimmed, "MAIL FROM:") {
            let rest = trimmed[10..].trim();
            if rest.is_empty() {
                return Err(Self::Invalid(command.to_owned()));
            }

            // Format: MAIL FROM:<addr> [param1=value1] [param2=value2] ...
            let (addr, params) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));

            let mail_params = MailParameters::from_params_str(params).map_err(Self::Invalid)?;

            // mailparse rejects the null sender, so handle it explicitly
            if addr == "<>" {
                return Ok(Self::MailFrom(None, mail_params));
            }

            Ok(Self::MailFrom(Some(single_address(addr)?), mail_params))
        } else if has_prefix(trimmed, "RCPT TO:") {
            let rest = trimmed[8..].trim();
            if rest.is_empty() {
                return Err(Self::Invalid(command.to_owned()));
            }

            // Parameters after the forward-path are accepted and ignored
            let addr = rest.split(char::is_whitespace).next().unwrap_or(rest);
            Ok(Self::RcptTo(single_address(addr)?))
        } else if has_prefix(trimmed, "EHLO") || has_prefix(trimmed, "HELO") {
            match trimmed.split_once(' ') {
                Some((cmd, host)) if cmd.len() == 4 && !host.trim().is_empty() => {
                    let host = host.trim().to_string();
                    if cmd.eq_ignore_ascii_case("HELO") {
                        Ok(Self::Helo(HeloVariant::Helo(host)))
                    } else {
                        Ok(Self::Helo(HeloVariant::Ehlo(host)))
                    }
                }
                Some((cmd, _)) if cmd.len() != 4 => Err(Self::Unknown(command.to_owned())),
                _ if trimmed.len() == 4 => {
                    Err(Self::Invalid(format!("Expected hostname in {trimmed}")))
                }
                _ => Err(Self::Unknown(command.to_owned())),
            }
        } else if trimmed.eq_ignore_ascii_case("DATA") {
            Ok(Self::Data)
        } else if trimmed.eq_ignore_ascii_case("RSET") {
            Ok(Self::Rset)
        } else if has_prefix(trimmed, "NOOP") && (trimmed.len() == 4 || trimmed[4..].starts_with(' ')) {
            Ok(Self::Noop)
        } else if has_prefix(trimmed, "HELP") && (trimmed.len() == 4 || trimmed[4..].starts_with(' ')) {
            Ok(Self::Help)
        } else if trimmed.eq_ignore_ascii_case("QUIT") {
            Ok(Self::Quit)
        } else {
            Err(Self::Unknown(command.to_owned()))
        }
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Self;

    fn try_from(command: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(command).map_or_else(
            |_| Err(Self::Invalid("Unable to interpret command".to_string())),
            Self::try_from,
        )
    }
}

impl TryFrom<String> for Command {
    type Error = Self;

    fn try_from(command: String) -> Result<Self, Self::Error> {
        Self::try_from(command.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::{Command, HeloVariant, MailParameters};

    fn string_casing(string: &str) -> impl Iterator<Item = String> {
        let len = string.len();
        let num_cases = usize::pow(2, u32::try_from(len).unwrap_or(0));

        let (upper, lower) = string.chars().fold(
            (Vec::with_capacity(len), Vec::with_capacity(len)),
            |(mut upper, mut lower), c| {
                upper.push(c.to_ascii_uppercase());
                lower.push(c.to_ascii_lowercase());
                (upper, lower)
            },
        );

        (0..num_cases).map(move |i| {
            (0..len).fold(String::with_capacity(len), |mut s, idx| {
                if (i & (1 << idx)) == 0 {
                    s.push(lower[idx]);
                } else {
                    s.push(upper[idx]);
                }
                s
            })
        })
    }

    #[test]
    fn mail_from_command() {
        assert_eq!(
            Command::try_from("MAIL FROM:<a@x.com>"),
            Ok(Command::MailFrom(
                Some("a@x.com".to_string()),
                MailParameters::new()
            ))
        );
        assert_eq!(
            Command::try_from("Mail From: a@x.com"),
            Ok(Command::MailFrom(
                Some("a@x.com".to_string()),
                MailParameters::new()
            ))
        );

        assert!(Command::try_from("Mail From:").is_err());
        assert!(Command::try_from("Mail FROM:dasdas").is_err());

        assert_eq!(
            Command::try_from("MAIL FROM:<>"),
            Ok(Command::MailFrom(None, MailParameters::new()))
        );

        let params = MailParameters::from_params_str("BODY=8BITMIME SIZE=12345").unwrap();
        assert_eq!(
            Command::try_from("MAIL FROM:<a@x.com> size=12345 BODY=8BITMIME"),
            Ok(Command::MailFrom(Some("a@x.com".to_string()), params))
        );

        for comm in string_casing("mail from") {
            assert!(matches!(
                Command::try_from(format!("{comm}:<a@x.com>")),
                Ok(Command::MailFrom(Some(_), params)) if params.is_empty()
            ));
        }
    }

    #[test]
    fn mail_from_size_edge_cases() {
        for bad in [
            "MAIL FROM:<a@x.com> SIZE=0",
            "MAIL FROM:<a@x.com> SIZE=",
            "MAIL FROM:<a@x.com> SIZE=abc",
            "MAIL FROM:<a@x.com> SIZE=1000 SIZE=2000",
        ] {
            assert!(
                matches!(Command::try_from(bad), Err(Command::Invalid(_))),
                "{bad} should be rejected"
            );
        }

        let Ok(Command::MailFrom(_, params)) = Command::try_from("MAIL FROM:<> SiZe=500") else {
            panic!("null sender with SIZE should parse");
        };
        assert_eq!(params.size(), Some(500));
    }

    #[test]
    fn rcpt_to_command() {
        assert_eq!(
            Command::try_from("RCPT TO:<b@y.com>"),
            Ok(Command::RcptTo("b@y.com".to_string()))
        );
        assert_eq!(
            Command::try_from("Rcpt To: <b@y.com> NOTIFY=NEVER"),
            Ok(Command::RcptTo("b@y.com".to_string()))
        );

        assert!(Command::try_from("Rcpt To:").is_err());
        assert!(Command::try_from("RCPT TO:dasdsa").is_err());
        assert!(matches!(
            Command::try_from("RCPT TO dasdsa"),
            Err(Command::Unknown(_))
        ));

        for comm in string_casing("rcpt to") {
            assert!(matches!(
                Command::try_from(format!("{comm}:<b@y.com>")),
                Ok(Command::RcptTo(_))
            ));
        }
    }

    #[test]
    fn helo_ehlo_command() {
        assert!(matches!(Command::try_from("EHLO"), Err(Command::Invalid(_))));
        assert!(matches!(Command::try_from("HELO"), Err(Command::Invalid(_))));
        assert!(matches!(
            Command::try_from("HELOX there"),
            Err(Command::Unknown(_))
        ));

        assert_eq!(
            Command::try_from("EHLO client.example.com"),
            Ok(Command::Helo(HeloVariant::Ehlo(String::from(
                "client.example.com"
            ))))
        );

        for comm in string_casing("ehlo") {
            assert!(
                matches!(
                    Command::try_from(format!("{comm} test")),
                    Ok(Command::Helo(HeloVariant::Ehlo(_)))
                ),
                "'{comm}' should map to Ehlo"
            );
        }

        for comm in string_casing("helo") {
            assert!(
                matches!(
                    Command::try_from(format!("{comm} test")),
                    Ok(Command::Helo(HeloVariant::Helo(_))),
                ),
                "'{comm}' should map to Helo"
            );
        }
    }

    #[test]
    fn other_commands() {
        for (verb, expected) in [
            ("data", Command::Data),
            ("quit", Command::Quit),
            ("rset", Command::Rset),
            ("noop", Command::Noop),
            ("help", Command::Help),
        ] {
            for comm in string_casing(verb) {
                assert_eq!(Command::try_from(comm), Ok(expected.clone()));
            }
        }

        assert_eq!(Command::try_from("NOOP ignored"), Ok(Command::Noop));
        assert_eq!(Command::try_from("HELP DATA"), Ok(Command::Help));

        for unsupported in ["STARTTLS", "AUTH PLAIN", "VRFY a@x.com", "NOOPS"] {
            assert!(
                matches!(Command::try_from(unsupported), Err(Command::Unknown(_))),
                "{unsupported} should be unknown"
            );
        }

        assert!(matches!(
            Command::try_from(b"\xff\xfe".as_slice()),
            Err(Command::Invalid(_))
        ));
    }
}
