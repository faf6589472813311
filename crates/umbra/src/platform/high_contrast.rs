//! High contrast accessibility setting.
//!
//! - **Windows**: the `SPI_GETHIGHCONTRAST` system parameter
//! - **macOS**: `accessibilityDisplayShouldIncreaseContrast`
//!
//! Linux sources derive high contrast from their own settings.

/// Check whether high contrast is enabled.
///
/// Returns `false` if the setting cannot be queried.
#[cfg(target_os = "windows")]
pub(crate) fn is_enabled() -> bool {
    use windows::Win32::UI::Accessibility::{HCF_HIGHCONTRASTON, HIGHCONTRASTW};
    use windows::Win32::UI::WindowsAndMessaging::{
        SPI_GETHIGHCONTRAST, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, SystemParametersInfoW,
    };

    let mut hc = HIGHCONTRASTW {
        cbSize: std::mem::size_of::<HIGHCONTRASTW>() as u32,
        ..Default::default()
    };

    // SAFETY: `hc` is a live, correctly sized HIGHCONTRASTW with `cbSize`
    // set, and the call only writes within it.
    let result = unsafe {
        SystemParametersInfoW(
            SPI_GETHIGHCONTRAST,
            hc.cbSize,
            Some(&mut hc as *mut HIGHCONTRASTW as *mut std::ffi::c_void),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        )
    };

    match result {
        Ok(()) => hc.dwFlags.contains(HCF_HIGHCONTRASTON),
        Err(err) => {
            tracing::warn!(
                target: umbra_core::logging::targets::PLATFORM,
                error = %err,
                "SPI_GETHIGHCONTRAST failed"
            );
            false
        }
    }
}

/// Check whether high contrast is enabled.
#[cfg(target_os = "macos")]
pub(crate) fn is_enabled() -> bool {
    use objc2_app_kit::NSWorkspace;

    let workspace = NSWorkspace::sharedWorkspace();
    workspace.accessibilityDisplayShouldIncreaseContrast()
}

#[cfg(all(test, any(target_os = "windows", target_os = "macos")))]
mod tests {
    use super::*;

    #[test]
    fn test_high_contrast_query_is_stable() {
        assert_eq!(is_enabled(), is_enabled());
    }
}
