/// Converts a JFIF YCbCr sample to RGB, using 16.16 fixed-point coefficients.
///
/// ```text
/// R = Y + 1.40200 * (Cr - 128)
/// G = Y - 0.34414 * (Cb - 128) - 0.71414 * (Cr - 128)
/// B = Y + 1.77200 * (Cb - 128)
/// ```
pub fn to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    // Scaling Y by 0x10101 rather than 0x10000 rounds the result to nearest.
    let y = y as i32 * 0x10101;
    let cb = cb as i32 - 128;
    let cr = cr as i32 - 128;

    let r = y + 91881 * cr;
    let g = y - 22554 * cb - 46802 * cr;
    let b = y + 116130 * cb;
    (clamp_fixed(r), clamp_fixed(g), clamp_fixed(b))
}

fn clamp_fixed(value: i32) -> u8 {
    (value >> 16).clamp(0, 255) as u8
}

/// Packs 8-bit channels into a 5-6-5 pixel, red in the high bits.
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Expands a 5-6-5 pixel back to 8-bit channels, replicating the high bits into the low ones.
pub fn unpack_rgb565(pixel: u16) -> (u8, u8, u8) {
    let r = ((pixel >> 11) & 0x1F) as u8;
    let g = ((pixel >> 5) & 0x3F) as u8;
    let b = (pixel & 0x1F) as u8;
    ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}
