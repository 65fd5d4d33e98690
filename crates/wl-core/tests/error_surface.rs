use wl_core::errors::{ErrorInfo, WlError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("step", "42")
        .with_context("reason", "example")
}

#[test]
fn system_error_surface() {
    let err = WlError::System(sample_info("SYS001", "solver diverged"));
    assert_eq!(err.info().code, "SYS001");
    assert!(err.info().context.contains_key("step"));
}

#[test]
fn window_error_surface() {
    let err = WlError::Window(sample_info("W001", "observable outside window"));
    assert_eq!(err.info().code, "W001");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn config_error_surface() {
    let err = WlError::Config(sample_info("CFG001", "inverted window"));
    assert_eq!(err.info().code, "CFG001");
}

#[test]
fn rng_error_surface() {
    let err = WlError::Rng(sample_info("RN001", "invalid seed"));
    assert_eq!(err.info().code, "RN001");
}

#[test]
fn serde_error_surface() {
    let err = WlError::Serde(sample_info("S001", "schema mismatch"));
    assert_eq!(err.info().code, "S001");
}

#[test]
fn error_display_includes_context_and_hint() {
    let err = WlError::Window(
        ErrorInfo::new("W002", "bin lookup failed")
            .with_context("value", "11.0")
            .with_hint("widen the energy window"),
    );
    let rendered = err.to_string();
    assert!(rendered.contains("W002"));
    assert!(rendered.contains("value=11.0"));
    assert!(rendered.contains("widen the energy window"));
}
