/// Extensions accepted by the upload endpoint (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv"];

/// Longest stored filename we will produce, in bytes
const MAX_FILENAME_LEN: usize = 255;

/// Reserved device names that cannot be used as filenames on Windows
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn missing_file_part() -> Self {
        Self {
            code: "MISSING_FILE_PART",
            message: "No file part".to_string(),
        }
    }

    pub fn empty_filename() -> Self {
        Self {
            code: "EMPTY_FILENAME",
            message: "No selected file".to_string(),
        }
    }

    pub fn invalid_format() -> Self {
        Self {
            code: "INVALID_FORMAT",
            message: "Invalid file format".to_string(),
        }
    }

    pub fn invalid_filename() -> Self {
        Self {
            code: "INVALID_FILENAME",
            message: "Invalid filename".to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Returns the lowercased text after the last '.', if the name has one
fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}

/// Checks the filename's extension against the allowlist
pub fn allowed_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Sanitizes a client-supplied filename so it is safe to join onto the storage directory.
///
/// Directory components are dropped, whitespace runs become a single `_`, anything
/// other than ASCII alphanumerics and `._-` is removed, and leading or trailing
/// `.`/`_` are stripped. Returns `None` when nothing usable is left.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    // Only the last path component, whichever separator the client used
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("");

    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let mut sanitized = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();

    if sanitized.is_empty() {
        return None;
    }

    let stem = sanitized.split('.').next().unwrap_or("").to_uppercase();
    if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        sanitized.insert(0, '_');
    }

    // ASCII only at this point, so any byte index is a char boundary
    if sanitized.len() > MAX_FILENAME_LEN {
        let ext = extension_of(&sanitized).unwrap_or_default();
        let keep = MAX_FILENAME_LEN.saturating_sub(ext.len() + 1);
        sanitized = format!("{}.{}", &sanitized[..keep], ext);
    }

    Some(sanitized)
}

/// Full validation pipeline for an uploaded file's name.
///
/// Returns the name the file should be stored under.
pub fn validate_upload_filename(filename: &str) -> Result<String, ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError::empty_filename());
    }

    if !allowed_file(filename) {
        return Err(ValidationError::invalid_format());
    }

    // Sanitizing may eat the stem (e.g. non-ASCII names); the stored name still
    // has to carry an allowed extension and something in front of it
    match sanitize_filename(filename) {
        Some(name) if allowed_file(&name) && !name.starts_with('.') => Ok(name),
        _ => Err(ValidationError::invalid_filename()),
    }
}
