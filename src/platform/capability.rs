use crate::config::DeviceInfo;

/// Platform strings of devices that refuse to autoplay the service's inline mp4.
const NON_AUTOPLAY_PLATFORMS: &[&str] = &["iPad", "iPhone", "iPod"];

/// Classification of the viewing device, computed once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapability {
    inline_video: bool,
}

impl PlatformCapability {
    /// `None` is a headless or non-browser host; it is always treated as capable.
    pub fn detect(device: Option<&DeviceInfo>) -> Self {
        let restricted = device.is_some_and(is_restricted_video_platform);
        Self {
            inline_video: !restricted,
        }
    }

    pub const fn with_inline_video(inline_video: bool) -> Self {
        Self { inline_video }
    }

    /// Whether inline video elements can be offered on this device.
    pub fn inline_video(&self) -> bool {
        self.inline_video
    }
}

impl Default for PlatformCapability {
    fn default() -> Self {
        Self::detect(None)
    }
}

fn is_restricted_video_platform(device: &DeviceInfo) -> bool {
    let Some(platform) = device.platform.as_deref().filter(|p| !p.is_empty()) else {
        return false;
    };
    if NON_AUTOPLAY_PLATFORMS.iter().any(|p| platform.contains(p)) {
        return true;
    }
    // Tablets that report a desktop platform string still expose touch points.
    platform == "MacIntel" && device.max_touch_points > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(platform: &str, touch: u32) -> DeviceInfo {
        DeviceInfo {
            platform: Some(platform.to_string()),
            max_touch_points: touch,
        }
    }

    #[test]
    fn headless_defaults_to_inline_video() {
        assert!(PlatformCapability::detect(None).inline_video());
        assert!(PlatformCapability::detect(Some(&DeviceInfo::default())).inline_video());
    }

    #[test]
    fn handheld_platforms_cannot_play_inline() {
        for name in ["iPhone", "iPad", "iPod touch"] {
            assert!(!PlatformCapability::detect(Some(&device(name, 5))).inline_video());
        }
    }

    #[test]
    fn desktop_platform_with_touch_is_a_tablet() {
        assert!(!PlatformCapability::detect(Some(&device("MacIntel", 5))).inline_video());
        assert!(PlatformCapability::detect(Some(&device("MacIntel", 0))).inline_video());
        assert!(PlatformCapability::detect(Some(&device("Linux x86_64", 10))).inline_video());
    }
}
