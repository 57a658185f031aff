//! Device emulation catalog.
//!
//! [`DEVICE_DESCRIPTORS`] is the compiled-in, read-only source list. The
//! [`DeviceCatalog`] built from it offers the same descriptors two ways: by
//! position and by name. The catalog is cheap to build and is rebuilt on
//! every access rather than cached, so concurrent accessors never share
//! mutable state.

use serde::Serialize;
use std::collections::HashMap;
use std::ops::Index;

/// Emulated screen size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A named, immutable emulation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub viewport: Viewport,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
}

/// The fixed, ordered descriptor source.
pub static DEVICE_DESCRIPTORS: &[DeviceDescriptor] = &[
    DeviceDescriptor {
        name: "Desktop Firefox",
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
        viewport: Viewport {
            width: 1280,
            height: 720,
        },
        device_scale_factor: 1.0,
        is_mobile: false,
        has_touch: false,
    },
    DeviceDescriptor {
        name: "Desktop Firefox HiDPI",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:128.0) Gecko/20100101 Firefox/128.0",
        viewport: Viewport {
            width: 1280,
            height: 720,
        },
        device_scale_factor: 2.0,
        is_mobile: false,
        has_touch: false,
    },
    DeviceDescriptor {
        name: "iPad (gen 7)",
        user_agent: "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
        viewport: Viewport {
            width: 810,
            height: 1080,
        },
        device_scale_factor: 2.0,
        is_mobile: true,
        has_touch: true,
    },
    DeviceDescriptor {
        name: "iPhone 11",
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
        viewport: Viewport {
            width: 414,
            height: 715,
        },
        device_scale_factor: 2.0,
        is_mobile: true,
        has_touch: true,
    },
    DeviceDescriptor {
        name: "iPhone 11 landscape",
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
        viewport: Viewport {
            width: 800,
            height: 364,
        },
        device_scale_factor: 2.0,
        is_mobile: true,
        has_touch: true,
    },
    DeviceDescriptor {
        name: "Pixel 5",
        user_agent: "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        viewport: Viewport {
            width: 393,
            height: 851,
        },
        device_scale_factor: 2.75,
        is_mobile: true,
        has_touch: true,
    },
    DeviceDescriptor {
        name: "Pixel 5 landscape",
        user_agent: "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        viewport: Viewport {
            width: 851,
            height: 393,
        },
        device_scale_factor: 2.75,
        is_mobile: true,
        has_touch: true,
    },
    DeviceDescriptor {
        name: "Galaxy S9+",
        user_agent: "Mozilla/5.0 (Linux; Android 10; SM-G965F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        viewport: Viewport {
            width: 320,
            height: 658,
        },
        device_scale_factor: 4.5,
        is_mobile: true,
        has_touch: true,
    },
];

/// Dual-view catalog over the descriptor source.
///
/// Invariant: the positional sequence and the name-keyed lookup always hold
/// exactly the same descriptors, so `catalog[name]` and `catalog[i]` resolve
/// to the same entry for a descriptor at position `i`.
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    ordered: Vec<&'static DeviceDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl DeviceCatalog {
    pub(crate) fn build(source: &'static [DeviceDescriptor]) -> Self {
        let ordered: Vec<_> = source.iter().collect();
        let by_name: HashMap<_, _> = source
            .iter()
            .enumerate()
            .map(|(i, descriptor)| (descriptor.name, i))
            .collect();
        debug_assert_eq!(by_name.len(), ordered.len(), "descriptor names must be unique");
        Self { ordered, by_name }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Looks up a descriptor by its name.
    pub fn get(&self, name: &str) -> Option<&'static DeviceDescriptor> {
        self.by_name.get(name).map(|&i| self.ordered[i])
    }

    /// Iterates descriptors in source order.
    pub fn iter(&self) -> impl Iterator<Item = &'static DeviceDescriptor> + '_ {
        self.ordered.iter().copied()
    }

    /// Iterates descriptor names in source order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ordered.iter().map(|descriptor| descriptor.name)
    }
}

impl Index<usize> for DeviceCatalog {
    type Output = DeviceDescriptor;

    fn index(&self, index: usize) -> &DeviceDescriptor {
        self.ordered[index]
    }
}

impl Index<&str> for DeviceCatalog {
    type Output = DeviceDescriptor;

    fn index(&self, name: &str) -> &DeviceDescriptor {
        self.get(name)
            .unwrap_or_else(|| panic!("no device named {name:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_views_cover_the_whole_source() {
        let catalog = DeviceCatalog::build(DEVICE_DESCRIPTORS);
        assert_eq!(catalog.len(), DEVICE_DESCRIPTORS.len());
        assert_eq!(catalog.names().count(), DEVICE_DESCRIPTORS.len());
        for (i, descriptor) in DEVICE_DESCRIPTORS.iter().enumerate() {
            assert_eq!(&catalog[descriptor.name], &catalog[i]);
            assert!(std::ptr::eq(catalog.get(descriptor.name).unwrap(), descriptor));
        }
    }

    #[test]
    fn lookup_has_no_extra_entries() {
        let catalog = DeviceCatalog::build(DEVICE_DESCRIPTORS);
        assert!(catalog.get("No Such Device").is_none());
    }

    #[test]
    fn order_matches_the_source() {
        let catalog = DeviceCatalog::build(DEVICE_DESCRIPTORS);
        let names: Vec<_> = catalog.names().collect();
        let source_names: Vec<_> = DEVICE_DESCRIPTORS.iter().map(|d| d.name).collect();
        assert_eq!(names, source_names);
    }

    #[test]
    fn rebuilt_catalogs_are_independent() {
        let first = DeviceCatalog::build(DEVICE_DESCRIPTORS);
        let second = DeviceCatalog::build(DEVICE_DESCRIPTORS);
        assert_eq!(first.len(), second.len());
        // Same static source, distinct view allocations.
        assert!(!std::ptr::eq(
            first.ordered.as_ptr(),
            second.ordered.as_ptr()
        ));
    }
}
