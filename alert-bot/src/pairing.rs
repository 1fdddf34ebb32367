//! Operator-facing rendering of the pairing challenge.
//!
//! Logs are JSON, so the challenge is also drawn as a terminal QR code on
//! stderr where a phone camera can read it.

use std::time::Duration;

use qrcode::render::unicode::Dense1x2;
use qrcode::types::QrError;
use qrcode::QrCode;

/// Draw `code` as a QR code using half-block characters, light on dark so it
/// scans from a dark terminal.
pub fn render_qr(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// The full block printed for the operator: heading, QR, expiry notice.
pub fn challenge_banner(code: &str, expires_in: Duration) -> Result<String, QrError> {
    let qr = render_qr(code)?;
    Ok(format!(
        "SCAN THIS QR CODE TO AUTHENTICATE WHATSAPP:\n\n{qr}\n\
         QR code expires in {} seconds. Scan immediately!\n",
        expires_in.as_secs()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiline_block() {
        let image = render_qr("2@AbCdEf,ghIjKl,MnOpQr==").unwrap();
        let lines: Vec<_> = image.lines().collect();
        assert!(lines.len() > 10);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn banner_carries_expiry_notice() {
        let banner = challenge_banner("2@xyz", Duration::from_secs(60)).unwrap();
        assert!(banner.starts_with("SCAN THIS QR CODE"));
        assert!(banner.contains("expires in 60 seconds"));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let huge = "x".repeat(8_000);
        assert!(render_qr(&huge).is_err());
    }
}
