//! Header blocks (RFC 5322 section 2.2).

/// Header fields in the order they appear. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// An empty header block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter_named(name).next()
    }

    /// Every value of `name`, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.iter_named(name).collect()
    }

    /// Whether the block has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn iter_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse a header block, stopping at the first empty line.
    ///
    /// Folded lines are unfolded with a single space. Lines that are neither
    /// a `Name: value` field nor a continuation are dropped, as is a
    /// continuation with no field before it.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.fields.last_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.add(name.trim(), value.trim());
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_repeated_fields_keep_order() {
        let headers = Headers::parse("Received: from a\nreceived: from b\n");
        assert_eq!(headers.get_all("Received"), vec!["from a", "from b"]);
        assert!(headers.get_all("X-Missing").is_empty());
    }

    #[test]
    fn test_values_outlive_lookup_name() {
        let headers = Headers::parse("Subject: hello\nTo: a@x\nTo: b@x\n");
        let subject = {
            let name = String::from("subject");
            headers.get(&name)
        };
        let recipients = {
            let name = "to".to_ascii_uppercase();
            headers.get_all(&name)
        };
        assert_eq!(subject, Some("hello"));
        assert_eq!(recipients, vec!["a@x", "b@x"]);
    }

    #[test]
    fn test_unfolding_and_end_of_block() {
        let headers = Headers::parse(concat!(
            "Subject: Quarterly\r\n",
            "\treport\r\n",
            "Content-Type: multipart/mixed;\r\n",
            "  boundary=\"x\"\r\n",
            "\r\n",
            "Body-Looking: line\r\n"
        ));
        assert_eq!(headers.get("Subject"), Some("Quarterly report"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("multipart/mixed; boundary=\"x\"")
        );
        assert_eq!(headers.get("Body-Looking"), None);
    }

    #[test]
    fn test_malformed_lines_are_dropped() {
        let headers = Headers::parse(" orphan continuation\nnot a header\nSubject: ok\n");
        assert_eq!(headers.get_all("Subject"), vec!["ok"]);
        assert_eq!(headers, {
            let mut expected = Headers::new();
            expected.add("Subject", "ok");
            expected
        });
    }

    #[test]
    fn test_empty_block() {
        assert!(Headers::parse("").is_empty());
        assert!(Headers::parse("\r\nSubject: body\r\n").is_empty());
    }
}
