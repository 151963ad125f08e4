//! Minimal SOAP 1.2 plumbing for the ONVIF surface.
//!
//! The messages this gateway exchanges are a small, fixed set, so they
//! are assembled from templates and picked apart with tag scanning
//! instead of a full XML stack. Namespace prefixes on inbound documents
//! vary by client and are ignored when matching tags.

use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

pub const ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";

const UTC_MILLIS: &[FormatItem<'_>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// Wraps header and body fragments into a SOAP 1.2 envelope.
pub fn envelope(header: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <s:Envelope xmlns:s=\"{ENV_NS}\" xmlns:wsa=\"{WSA_NS}\">\
         <s:Header>{header}</s:Header>\
         <s:Body>{body}</s:Body>\
         </s:Envelope>"
    )
}

/// WS-Addressing header block for a reply.
pub fn reply_header(action: &str, relates_to: &str) -> String {
    let mut header = format!(
        "<wsa:Action>{}</wsa:Action>\
         <wsa:MessageID>urn:uuid:{}</wsa:MessageID>",
        xml_escape(action),
        uuid::Uuid::new_v4()
    );
    if !relates_to.is_empty() {
        header.push_str(&format!(
            "<wsa:RelatesTo>{}</wsa:RelatesTo>",
            xml_escape(relates_to)
        ));
    }
    header
}

/// SOAP sender fault for requests this gateway does not serve.
pub fn fault(reason: &str) -> String {
    envelope(
        "",
        &format!(
            "<s:Fault><s:Code><s:Value>s:Sender</s:Value></s:Code>\
             <s:Reason><s:Text xml:lang=\"en\">{}</s:Text></s:Reason></s:Fault>",
            xml_escape(reason)
        ),
    )
}

/// Extracts the text content of the first element whose local name matches
/// `tag`, regardless of its namespace prefix.
pub fn extract_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let mut search = 0;
    while let Some(pos) = xml[search..].find('<') {
        let open = search + pos;
        let rest = &xml[open + 1..];
        let end = rest.find(['>', ' '])?;
        let name = &rest[..end];
        let local = name.rsplit(':').next().unwrap_or(name);

        if local == tag && !name.starts_with('/') {
            let content_start = open + 1 + rest.find('>')? + 1;
            let close = xml[content_start..].find("</")?;
            return Some(&xml[content_start..content_start + close]);
        }
        search = open + 1;
    }
    None
}

/// Normalizes a WS-Addressing value: some stacks wrap MessageIDs across
/// lines or pad around the `urn:uuid:` colon, so all whitespace inside
/// the value is stripped, not just trimmed.
pub fn normalize_wsa_value(value: &str) -> String {
    value.split_whitespace().collect()
}

/// MessageID of the inbound envelope, normalized.
pub fn extract_message_id(xml: &str) -> Option<String> {
    extract_tag(xml, "MessageID").map(normalize_wsa_value)
}

/// wsa:Action of the inbound envelope, normalized.
pub fn extract_action(xml: &str) -> Option<String> {
    extract_tag(xml, "Action").map(normalize_wsa_value)
}

pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// ISO-8601 UTC with millisecond precision, the timestamp shape ONVIF
/// clients expect.
pub fn format_utc(time: OffsetDateTime) -> String {
    time.format(UTC_MILLIS)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000Z"))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_extract_tag_ignores_prefix() {
        let xml = "<s:Envelope><a:MessageID>urn:uuid:42</a:MessageID></s:Envelope>";
        assert_eq!(extract_tag(xml, "MessageID"), Some("urn:uuid:42"));
        assert_eq!(extract_message_id(xml).as_deref(), Some("urn:uuid:42"));
    }

    #[test]
    fn test_extract_tag_with_attributes() {
        let xml = "<Action mustUnderstand=\"1\"> probe </Action>";
        assert_eq!(extract_action(xml).as_deref(), Some("probe"));
    }

    #[test]
    fn test_wsa_value_whitespace_is_stripped() {
        assert_eq!(normalize_wsa_value("  urn:uuid:42 \r\n"), "urn:uuid:42");
        assert_eq!(normalize_wsa_value("urn:uuid:\r\n  42"), "urn:uuid:42");
        let xml = "<wsa:MessageID>\n urn:uuid: 42\n</wsa:MessageID>";
        assert_eq!(extract_message_id(xml).as_deref(), Some("urn:uuid:42"));
    }

    #[test]
    fn test_extract_tag_missing() {
        assert_eq!(extract_tag("<a>1</a>", "MessageID"), None);
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_format_utc_millis() {
        let ts = datetime!(2024-03-05 17:20:01.5 UTC);
        assert_eq!(format_utc(ts), "2024-03-05T17:20:01.500Z");
    }

    #[test]
    fn test_envelope_shape() {
        let doc = envelope("<h/>", "<b/>");
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains("<s:Header><h/></s:Header>"));
        assert!(doc.contains("<s:Body><b/></s:Body>"));
    }
}
