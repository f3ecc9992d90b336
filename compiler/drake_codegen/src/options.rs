//! Code generation options.

/// Settings for a [`CodegenCx`](crate::CodegenCx).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Target triple; `None` selects the host.
    pub target_triple: Option<String>,
    /// Verify the whole module in [`CodegenCx::finish`](crate::CodegenCx::finish).
    pub verify_functions: bool,
    /// Print the finished module to stderr.
    pub dump_ir: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            target_triple: None,
            verify_functions: true,
            dump_ir: false,
        }
    }
}

impl CodegenOptions {
    /// Defaults overridden by `DRAKE_TARGET`, `DRAKE_VERIFY` and
    /// `DRAKE_DUMP_IR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(triple) = lookup("DRAKE_TARGET").filter(|t| !t.is_empty()) {
            options.target_triple = Some(triple);
        }
        if let Some(verify) = lookup("DRAKE_VERIFY") {
            options.verify_functions = !is_off(&verify);
        }
        if let Some(dump) = lookup("DRAKE_DUMP_IR") {
            options.dump_ir = !dump.is_empty() && !is_off(&dump);
        }
        options
    }

    #[must_use]
    pub fn with_target(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = Some(triple.into());
        self
    }
}

fn is_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
