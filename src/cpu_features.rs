use std::collections::BTreeSet as Set;
use std::fmt;
use std::str::FromStr;

use derive_more::Display;

use crate::error::CompileError;

/// Architectures whose CPU features can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Architecture {
    #[display("x86_64")]
    X86_64,
    #[display("aarch64")]
    Aarch64,
}

impl Architecture {
    /// The architecture this process runs on, if it is one we know.
    #[must_use]
    pub fn host() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Self::X86_64)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Aarch64)
        } else {
            None
        }
    }
}

/// A CPU capability code generation may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CpuFeature {
    Sse2,
    Sse3,
    Ssse3,
    Sse41,
    Sse42,
    Popcnt,
    Avx,
    Bmi1,
    Bmi2,
    Avx2,
    Avx512dq,
    Avx512vl,
    Avx512f,
    Lzcnt,
    Neon,
}

impl CpuFeature {
    pub const ALL: [Self; 15] = [
        Self::Sse2,
        Self::Sse3,
        Self::Ssse3,
        Self::Sse41,
        Self::Sse42,
        Self::Popcnt,
        Self::Avx,
        Self::Bmi1,
        Self::Bmi2,
        Self::Avx2,
        Self::Avx512dq,
        Self::Avx512vl,
        Self::Avx512f,
        Self::Lzcnt,
        Self::Neon,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sse2 => "sse2",
            Self::Sse3 => "sse3",
            Self::Ssse3 => "ssse3",
            Self::Sse41 => "sse4.1",
            Self::Sse42 => "sse4.2",
            Self::Popcnt => "popcnt",
            Self::Avx => "avx",
            Self::Bmi1 => "bmi",
            Self::Bmi2 => "bmi2",
            Self::Avx2 => "avx2",
            Self::Avx512dq => "avx512dq",
            Self::Avx512vl => "avx512vl",
            Self::Avx512f => "avx512f",
            Self::Lzcnt => "lzcnt",
            Self::Neon => "neon",
        }
    }

    #[must_use]
    pub fn architecture(self) -> Architecture {
        match self {
            Self::Neon => Architecture::Aarch64,
            _ => Architecture::X86_64,
        }
    }
}

impl fmt::Display for CpuFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuFeature {
    type Err = FeatureParseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if !is_identifier(name) {
            return Err(FeatureParseError::malformed(name));
        }
        Self::ALL
            .into_iter()
            .find(|feature| feature.name() == name)
            .ok_or_else(|| FeatureParseError::unknown_name(name))
    }
}

/// `[A-Za-z][A-Za-z0-9._]*`
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FeatureParseReason {
    /// Well-formed, but not the name of any known feature.
    #[display("unknown feature name")]
    UnknownName,
    /// Empty, or not a bare identifier with an optional `+`/`-` prefix.
    #[display("malformed syntax")]
    MalformedSyntax,
}

/// A CPU feature selector could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{reason} in CPU feature selector `{text}`")]
pub struct FeatureParseError {
    text: String,
    reason: FeatureParseReason,
}

impl FeatureParseError {
    #[must_use]
    pub fn unknown_name(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reason: FeatureParseReason::UnknownName,
        }
    }

    #[must_use]
    pub fn malformed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reason: FeatureParseReason::MalformedSyntax,
        }
    }

    /// The offending text, verbatim.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn reason(&self) -> FeatureParseReason {
        self.reason
    }

    /// The known feature closest to an unknown name, for "did you mean" hints.
    #[must_use]
    pub fn suggestion(&self) -> Option<CpuFeature> {
        const MAX_DISTANCE: usize = 2;

        if self.reason != FeatureParseReason::UnknownName {
            return None;
        }
        let text = self.text.to_ascii_lowercase();
        CpuFeature::ALL
            .into_iter()
            .map(|feature| (edit_distance(&text, feature.name()), feature))
            .filter(|(distance, _)| *distance <= MAX_DISTANCE)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, feature)| feature)
    }
}

/// Levenshtein distance over bytes; feature names are ASCII.
fn edit_distance(a: &str, b: &str) -> usize {
    let b = b.as_bytes();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.bytes().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// A single `+feature`, `-feature` or bare `feature` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureSelector {
    Enable(CpuFeature),
    Disable(CpuFeature),
}

impl FeatureSelector {
    /// Parse a comma separated list of selectors.
    ///
    /// # Errors
    /// On the first token that fails to parse. An empty list is malformed.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, FeatureParseError> {
        if list.trim().is_empty() {
            return Err(FeatureParseError::malformed(list));
        }
        list.split(',').map(str::parse).collect()
    }

    #[must_use]
    pub fn feature(self) -> CpuFeature {
        match self {
            Self::Enable(feature) | Self::Disable(feature) => feature,
        }
    }
}

impl FromStr for FeatureSelector {
    type Err = FeatureParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        let (enable, name) = match token.as_bytes().first() {
            Some(b'+') => (true, &token[1..]),
            Some(b'-') => (false, &token[1..]),
            _ => (true, token),
        };
        if name.is_empty() {
            return Err(FeatureParseError::malformed(token));
        }
        let feature: CpuFeature = name.parse()?;
        Ok(if enable {
            Self::Enable(feature)
        } else {
            Self::Disable(feature)
        })
    }
}

/// An ordered set of CPU features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CpuFeatureSet(Set<CpuFeature>);

impl CpuFeatureSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The features the current CPU reports at runtime.
    #[must_use]
    pub fn for_host() -> Self {
        let mut features = Self::new();

        #[cfg(target_arch = "x86_64")]
        {
            macro_rules! detect {
                ($($name:tt => $feature:ident),* $(,)?) => {
                    $(
                        if std::arch::is_x86_feature_detected!($name) {
                            features.insert(CpuFeature::$feature);
                        }
                    )*
                };
            }
            detect! {
                "sse2" => Sse2,
                "sse3" => Sse3,
                "ssse3" => Ssse3,
                "sse4.1" => Sse41,
                "sse4.2" => Sse42,
                "popcnt" => Popcnt,
                "avx" => Avx,
                "bmi1" => Bmi1,
                "bmi2" => Bmi2,
                "avx2" => Avx2,
                "avx512dq" => Avx512dq,
                "avx512vl" => Avx512vl,
                "avx512f" => Avx512f,
                "lzcnt" => Lzcnt,
            }
        }

        #[cfg(target_arch = "aarch64")]
        if std::arch::is_aarch64_feature_detected!("neon") {
            features.insert(CpuFeature::Neon);
        }

        features
    }

    pub fn insert(&mut self, feature: CpuFeature) -> bool {
        self.0.insert(feature)
    }

    pub fn remove(&mut self, feature: CpuFeature) -> bool {
        self.0.remove(&feature)
    }

    #[must_use]
    pub fn contains(&self, feature: CpuFeature) -> bool {
        self.0.contains(&feature)
    }

    pub fn apply(&mut self, selector: FeatureSelector) {
        match selector {
            FeatureSelector::Enable(feature) => self.insert(feature),
            FeatureSelector::Disable(feature) => self.remove(feature),
        };
    }

    pub fn iter(&self) -> impl Iterator<Item = CpuFeature> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<CpuFeature> for CpuFeatureSet {
    fn from_iter<I: IntoIterator<Item = CpuFeature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CpuFeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, feature) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "+{feature}")?;
        }
        Ok(())
    }
}

/// The architecture and CPU features code is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    architecture: Architecture,
    cpu_features: CpuFeatureSet,
}

impl Target {
    /// # Errors
    /// When a feature does not exist on `architecture`.
    pub fn new(
        architecture: Architecture,
        cpu_features: CpuFeatureSet,
    ) -> Result<Self, CompileError> {
        if let Some(foreign) = cpu_features
            .iter()
            .find(|feature| feature.architecture() != architecture)
        {
            return Err(CompileError::UnsupportedTarget(format!(
                "CPU feature `{foreign}` is not available on {architecture}"
            )));
        }
        Ok(Self {
            architecture,
            cpu_features,
        })
    }

    /// The host architecture with every feature detected at runtime.
    ///
    /// # Errors
    /// When the host architecture is not one code can be generated for.
    pub fn host() -> Result<Self, CompileError> {
        let architecture = Architecture::host().ok_or_else(|| {
            CompileError::UnsupportedTarget(format!(
                "host architecture `{}` is not supported",
                std::env::consts::ARCH
            ))
        })?;
        Self::new(architecture, CpuFeatureSet::for_host())
    }

    /// Apply selectors in order, the last selector for a feature wins.
    ///
    /// # Errors
    /// When an enabled feature does not exist on this target's architecture.
    pub fn with_selectors(self, selectors: &[FeatureSelector]) -> Result<Self, CompileError> {
        let Self {
            architecture,
            mut cpu_features,
        } = self;
        for selector in selectors {
            cpu_features.apply(*selector);
        }
        Self::new(architecture, cpu_features)
    }

    #[must_use]
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    #[must_use]
    pub fn cpu_features(&self) -> &CpuFeatureSet {
        &self.cpu_features
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            architecture: Architecture::host().unwrap_or(Architecture::X86_64),
            cpu_features: CpuFeatureSet::for_host(),
        }
    }
}
