use std::fmt;

use log::debug;

use super::{DeviceConfig, DeviceError};

/// Capability tier requested from an adapter when creating a device.
///
/// Variants are declared from most to least capable; the derived ordering
/// follows declaration order, so `Full < Downlevel < WebGl2`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum FeatureLevel {
    /// Full desktop-class limits.
    Full,
    /// Reduced limits supported by older or mobile hardware.
    Downlevel,
    /// The lowest tier, matching WebGL2-class hardware.
    WebGl2,
}

impl FeatureLevel {
    /// All levels in descending capability order.
    pub const ALL: [FeatureLevel; 3] = [
        FeatureLevel::Full,
        FeatureLevel::Downlevel,
        FeatureLevel::WebGl2,
    ];

    /// Returns `true` if a device created at `self` satisfies `required`.
    pub fn satisfies(self, required: FeatureLevel) -> bool {
        self <= required
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FeatureLevel::Full => "full",
            FeatureLevel::Downlevel => "downlevel",
            FeatureLevel::WebGl2 => "webgl2",
        };
        f.write_str(text)
    }
}

/// Which kind of adapter a device is created on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AdapterKind {
    Hardware,
    /// CPU rasterizer, used only when no hardware adapter works.
    Software,
}

/// One (adapter, feature level) pair to try during device creation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DeviceCandidate {
    pub adapter: AdapterKind,
    pub level: FeatureLevel,
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", self.adapter, self.level)
    }
}

/// Builds the priority-ordered candidate list for `config`.
///
/// Every configured level is tried on hardware first; the software adapter
/// repeats the list only when `allow_software_fallback` is set.
pub fn device_candidates(config: &DeviceConfig) -> Vec<DeviceCandidate> {
    let mut adapters = vec![AdapterKind::Hardware];
    if config.allow_software_fallback {
        adapters.push(AdapterKind::Software);
    }

    adapters
        .into_iter()
        .flat_map(|adapter| {
            config
                .feature_levels
                .iter()
                .map(move |&level| DeviceCandidate { adapter, level })
        })
        .collect()
}

/// Attempts each candidate in order and returns the first success.
///
/// Fails with [`DeviceError::NoSupportedFeatureLevel`] once the list is exhausted.
pub fn first_supported<T>(
    candidates: &[DeviceCandidate],
    mut attempt: impl FnMut(DeviceCandidate) -> Result<T, DeviceError>,
) -> Result<(DeviceCandidate, T), DeviceError> {
    for &candidate in candidates {
        match attempt(candidate) {
            Ok(value) => return Ok((candidate, value)),
            Err(err) => debug!("device candidate {candidate} rejected: {err}"),
        }
    }

    Err(DeviceError::NoSupportedFeatureLevel {
        tried: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_try_hardware_before_software() {
        let config = DeviceConfig {
            feature_levels: vec![FeatureLevel::Full, FeatureLevel::Downlevel],
            allow_software_fallback: true,
            ..DeviceConfig::default()
        };

        let got = device_candidates(&config);
        let expected = [
            (AdapterKind::Hardware, FeatureLevel::Full),
            (AdapterKind::Hardware, FeatureLevel::Downlevel),
            (AdapterKind::Software, FeatureLevel::Full),
            (AdapterKind::Software, FeatureLevel::Downlevel),
        ];
        assert_eq!(got.len(), expected.len());
        for (c, (adapter, level)) in got.iter().zip(expected) {
            assert_eq!(c.adapter, adapter);
            assert_eq!(c.level, level);
        }
    }

    #[test]
    fn candidates_without_fallback_are_hardware_only() {
        let config = DeviceConfig {
            allow_software_fallback: false,
            ..DeviceConfig::default()
        };
        let got = device_candidates(&config);
        assert_eq!(got.len(), FeatureLevel::ALL.len());
        assert!(got.iter().all(|c| c.adapter == AdapterKind::Hardware));
    }

    #[test]
    fn first_supported_short_circuits() {
        let candidates = device_candidates(&DeviceConfig::default());
        let mut calls = 0;
        let (picked, value) = first_supported(&candidates, |c| {
            calls += 1;
            if c.level == FeatureLevel::Downlevel {
                Ok(7)
            } else {
                Err(DeviceError::FeatureLevelUnsupported(c.level))
            }
        })
        .unwrap();

        assert_eq!(picked.level, FeatureLevel::Downlevel);
        assert_eq!(value, 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn first_supported_fails_when_exhausted() {
        let candidates = device_candidates(&DeviceConfig::default());
        let err = first_supported::<()>(&candidates, |c| {
            Err(DeviceError::FeatureLevelUnsupported(c.level))
        })
        .unwrap_err();

        assert!(matches!(
            err,
            DeviceError::NoSupportedFeatureLevel { tried } if tried == candidates.len()
        ));
    }

    #[test]
    fn satisfies_follows_capability_order() {
        assert!(FeatureLevel::Full.satisfies(FeatureLevel::WebGl2));
        assert!(FeatureLevel::Downlevel.satisfies(FeatureLevel::Downlevel));
        assert!(!FeatureLevel::WebGl2.satisfies(FeatureLevel::Full));
    }
}
