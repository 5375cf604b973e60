use std::sync::LazyLock;
use regex::Regex;

/// DNS class IN
pub const DNS_CLASS_IN: u16 = 0x01;
/// DNS record type CNAME
pub const DNS_TYPE_CNAME: u16 = 0x05;

/// Responder wildcards: any interface, any protocol
pub const IF_UNSPEC: i32 = -1;
pub const PROTO_UNSPEC: i32 = -1;

/// Publish flag telling the responder not to create a reverse (PTR) entry
pub const PUBLISH_NO_REVERSE: u32 = 1 << 4;

/// Default record TTL in seconds
pub const DEFAULT_TTL: u32 = 60;

/// Longest label allowed in a domain name
pub const MAX_LABEL_LEN: usize = 63;

static LOCAL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9-]{1,63}(?:\.[a-z0-9-]{1,63})*\.local$")
        .expect("static regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("malformed hostname: {0}")]
    Malformed(String),

    #[error("non-ASCII label in {0}")]
    NonAscii(String),

    #[error("label longer than 63 bytes in {0}")]
    LabelTooLong(String),

    #[error("truncated name data")]
    Truncated,

    #[error("unexpected data after name terminator")]
    TrailingData,
}

/// Check that `name` is a lowercase `<label>(.<label>)*.local` host name
pub fn validate_local_name(name: &str) -> Result<(), NameError> {
    if LOCAL_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(NameError::Malformed(name.to_string()))
    }
}

/// Trim and lowercase a user-supplied name, then validate it
pub fn normalize_local_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim().to_lowercase();
    validate_local_name(&name)?;
    Ok(name)
}

/// Encode a host name as uncompressed length-prefixed labels plus a zero terminator.
///
/// Empty labels (leading, trailing or doubled dots) are dropped, so
/// `"host.local."` and `"host.local"` encode identically.
pub fn fqdn_to_rdata(fqdn: &str) -> Result<Vec<u8>, NameError> {
    if !fqdn.is_ascii() {
        return Err(NameError::NonAscii(fqdn.to_string()));
    }

    let mut data = Vec::with_capacity(fqdn.len() + 2);
    for label in fqdn.split('.').filter(|l| !l.is_empty()) {
        if label.len() > MAX_LABEL_LEN {
            return Err(NameError::LabelTooLong(fqdn.to_string()));
        }
        data.push(label.len() as u8);
        data.extend_from_slice(label.as_bytes());
    }
    data.push(0);

    Ok(data)
}

/// Decode the output of [`fqdn_to_rdata`] back into a dotted name (no trailing dot).
pub fn rdata_to_fqdn(data: &[u8]) -> Result<String, NameError> {
    let mut labels = Vec::new();
    let mut pos = 0;

    loop {
        let len = *data.get(pos).ok_or(NameError::Truncated)? as usize;
        pos += 1;

        if len == 0 {
            break;
        }
        // Compression pointers (top bits set) are not valid here either
        if len > MAX_LABEL_LEN {
            return Err(NameError::LabelTooLong(format!("{}...", labels.join("."))));
        }

        let label = data.get(pos..pos + len).ok_or(NameError::Truncated)?;
        if !label.is_ascii() {
            return Err(NameError::NonAscii(String::from_utf8_lossy(label).into_owned()));
        }
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += len;
    }

    if pos != data.len() {
        return Err(NameError::TrailingData);
    }

    Ok(labels.join("."))
}
