use std::process::Command;

/// Who is sending a protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemIdentity {
    pub hostname: String,
    pub pid: u32,
}

impl SystemIdentity {
    pub fn collect() -> Self {
        Self {
            hostname: get_hostname(),
            pid: std::process::id(),
        }
    }

    pub fn new(hostname: impl Into<String>, pid: u32) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
        }
    }
}

fn get_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            Command::new("hostname")
                .output()
                .ok()
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| "Unknown".to_string())
}
