use std::fmt;

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const HASH_SLICE: usize = 8;

/// Addresses one terminal: a session plus an optional tab discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminalKey {
    pub session_id: String,
    pub tab_id: Option<String>,
}

impl TerminalKey {
    pub fn session(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            tab_id: None,
        }
    }

    pub fn tab(session_id: &str, tab_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            tab_id: Some(tab_id.to_string()),
        }
    }

    /// Deterministic tmux session name. The hash fragment keeps names unique
    /// even when sanitization collapses distinct ids to the same text.
    pub fn mux_session_name(&self) -> String {
        match &self.tab_id {
            Some(tab) => format!(
                "{}-tab-{}",
                session_mux_base(&self.session_id),
                sanitize_component(tab)
            ),
            None => session_mux_base(&self.session_id),
        }
    }
}

impl fmt::Display for TerminalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tab_id {
            Some(tab) => write!(f, "{}/{tab}", self.session_id),
            None => write!(f, "{}", self.session_id),
        }
    }
}

pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

fn name_hash(name: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in name.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn hash_fragment(name: &str) -> String {
    let hash_hex = format!("{:08x}", name_hash(name));
    hash_hex[..HASH_SLICE].to_string()
}

pub fn session_mux_base(session_id: &str) -> String {
    let sanitized = sanitize_component(session_id);
    let fragment = hash_fragment(session_id);
    format!("werft-{sanitized}-{fragment}")
}
