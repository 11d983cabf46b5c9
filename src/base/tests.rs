use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;

#[test]
fn test_net_error_roundtrip() {
    // Standard Chromium error
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    // Custom error
    let custom = NetError::RequestAlreadyStarted;
    let custom_code = custom.as_i32();
    assert_eq!(custom_code, -10001);
    assert!(matches!(
        NetError::from(custom_code),
        NetError::RequestAlreadyStarted
    ));
}

#[test]
fn test_cancelled_is_err_aborted() {
    assert_eq!(NetError::Cancelled.as_i32(), -3);
    assert!(NetError::Cancelled.is_cancelled());
    assert!(!NetError::ConnectionAborted.is_cancelled());
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
}

#[test]
fn test_context_variants_share_base_code() {
    let err = NetError::ConnectionFailedTo {
        host: "example.com".into(),
        port: 443,
        reason: "unreachable".into(),
    };
    assert_eq!(err.as_i32(), NetError::ConnectionFailed.as_i32());
}

#[test]
fn test_custom_codes_outside_chromium_ranges() {
    // Chromium assigns codes down to roughly -1000 (blob, cert, cache ranges).
    for err in [
        NetError::RequestAlreadyStarted,
        NetError::HttpBodyError,
        NetError::InvalidUtf8,
        NetError::ContentEncodingFailed,
    ] {
        assert!(err.as_i32() < -10000);
    }
}

#[test]
fn test_load_state_started() {
    assert!(!LoadState::Idle.is_started());
    assert!(LoadState::SendingRequest.is_started());
    assert!(LoadState::Closed.is_started());
}
