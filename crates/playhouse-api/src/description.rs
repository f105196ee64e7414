// UPnP device description
//
// Bridges serve `/description.xml`. Only a handful of flat text elements
// are needed for identity, so this reads them directly instead of building
// a document tree.

/// Model description every genuine bridge advertises.
pub(crate) const BRIDGE_MODEL_DESCRIPTION: &str = "Philips hue Personal Wireless Lighting";

/// The fields of a device description the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub model_description: Option<String>,
    pub serial_number: Option<String>,
    pub friendly_name: Option<String>,
}

impl DeviceDescription {
    pub fn parse(xml: &str) -> Self {
        Self {
            model_description: element_text(xml, "modelDescription"),
            serial_number: element_text(xml, "serialNumber"),
            friendly_name: element_text(xml, "friendlyName"),
        }
    }

    /// The serial, if this describes a bridge.
    pub fn bridge_serial(&self) -> Option<&str> {
        if self.model_description.as_deref() != Some(BRIDGE_MODEL_DESCRIPTION) {
            return None;
        }
        self.serial_number.as_deref().filter(|s| !s.is_empty())
    }
}

/// Text content of the first `<tag>` element, trimmed and entity-decoded.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let len = xml[start..].find(&close)?;
    Some(unescape(xml[start..start + len].trim()))
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
