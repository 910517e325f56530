//! Registry of RFB security-type identifiers.
//!
//! Values follow the IANA "Remote Framebuffer Security Types" registry.
//! Names are for display only; the prober never filters or reorders
//! the types a server offers.

/// Invalid (used by servers to signal failure in RFB 3.3).
pub const SECURITY_TYPE_INVALID: u8 = 0;
/// No authentication.
pub const SECURITY_TYPE_NONE: u8 = 1;
/// Classic VNC password authentication (DES challenge).
pub const SECURITY_TYPE_VNC_AUTH: u8 = 2;
/// RealVNC RA2.
pub const SECURITY_TYPE_RA2: u8 = 5;
/// RealVNC RA2ne.
pub const SECURITY_TYPE_RA2NE: u8 = 6;
/// TightVNC tunneling/authentication capabilities.
pub const SECURITY_TYPE_TIGHT: u8 = 16;
/// UltraVNC.
pub const SECURITY_TYPE_ULTRA: u8 = 17;
/// Anonymous TLS.
pub const SECURITY_TYPE_TLS: u8 = 18;
/// VeNCrypt.
pub const SECURITY_TYPE_VENCRYPT: u8 = 19;
/// GTK-VNC SASL.
pub const SECURITY_TYPE_SASL: u8 = 20;
/// MD5 hash authentication.
pub const SECURITY_TYPE_MD5: u8 = 21;
/// Colin Dean xvp.
pub const SECURITY_TYPE_XVP: u8 = 22;
/// Secure Tunnel.
pub const SECURITY_TYPE_SECURE_TUNNEL: u8 = 23;
/// Integrated SSH.
pub const SECURITY_TYPE_INTEGRATED_SSH: u8 = 24;
/// Apple Remote Desktop (Diffie-Hellman).
pub const SECURITY_TYPE_APPLE_ARD: u8 = 30;

/// Human-readable name of a security type, `"Unknown"` if unregistered.
pub fn security_type_name(id: u8) -> &'static str {
    match id {
        SECURITY_TYPE_INVALID => "Invalid",
        SECURITY_TYPE_NONE => "None",
        SECURITY_TYPE_VNC_AUTH => "VNC Authentication",
        SECURITY_TYPE_RA2 => "RA2",
        SECURITY_TYPE_RA2NE => "RA2ne",
        SECURITY_TYPE_TIGHT => "Tight",
        SECURITY_TYPE_ULTRA => "Ultra",
        SECURITY_TYPE_TLS => "TLS",
        SECURITY_TYPE_VENCRYPT => "VeNCrypt",
        SECURITY_TYPE_SASL => "SASL",
        SECURITY_TYPE_MD5 => "MD5 hash",
        SECURITY_TYPE_XVP => "xvp",
        SECURITY_TYPE_SECURE_TUNNEL => "Secure Tunnel",
        SECURITY_TYPE_INTEGRATED_SSH => "Integrated SSH",
        SECURITY_TYPE_APPLE_ARD => "Apple Remote Desktop",
        _ => "Unknown",
    }
}

/// Whether the server lets a client in without credentials.
pub fn allows_anonymous(types: &[u8]) -> bool {
    types.contains(&SECURITY_TYPE_NONE)
}
