use std::fmt;

/// The accessor strategies this crate provides
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// [`Eager`](crate::Eager): built before first access
    Eager,
    /// [`UnsyncLazy`](crate::UnsyncLazy): lazy, confined to one thread
    Unsync,
    /// [`Synchronized`](crate::Synchronized): lazy, locks on every access
    Synchronized,
    /// [`LazyLock`](crate::LazyLock): lazy, through `OnceLock`
    LazyLock,
    /// [`Singleton`](crate::Singleton): single-variant enum
    Constant,
    /// [`CheckedLazy`](crate::CheckedLazy): lazy, double-checked locking
    Checked,
}

impl Variant {
    /// Every variant, in the order they are reported
    pub const ALL: &'static [Self] = &[
        Self::Eager,
        Self::Unsync,
        Self::Synchronized,
        Self::LazyLock,
        Self::Constant,
        Self::Checked,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Unsync => "unsync",
            Self::Synchronized => "synchronized",
            Self::LazyLock => "lazy-lock",
            Self::Constant => "constant",
            Self::Checked => "checked",
        }
    }

    /// Returns `true` if one instance of the accessor can be shared between threads
    pub const fn is_thread_safe(self) -> bool {
        !matches!(self, Self::Unsync)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum;

    use super::Variant;

    #[test]
    fn names_match_cli_and_config() {
        for &variant in Variant::ALL {
            let cli = variant.to_possible_value().unwrap();
            assert_eq!(cli.get_name(), variant.name());

            let toml = toml::Value::try_from(variant).unwrap();
            assert_eq!(toml.as_str(), Some(variant.name()));
        }
    }

    #[test]
    fn display_honors_width() {
        assert_eq!(format!("{:<8}|", Variant::Eager), "eager   |");
        assert_eq!(format!("{}", Variant::LazyLock), "lazy-lock");
    }

    #[test]
    fn only_unsync_is_confined() {
        let confined: Vec<_> = Variant::ALL
            .iter()
            .filter(|variant| !variant.is_thread_safe())
            .collect();
        assert_eq!(confined, [&Variant::Unsync]);
    }
}
