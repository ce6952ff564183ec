pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Rec. 601 luma of a straight RGB triple, rounded.
pub(crate) fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    let y = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((y + 500) / 1000) as u8
}

/// Linear mix from `a` (t = 0) to `b` (t = 255).
pub(crate) fn lerp_u8(a: u8, b: u8, t: u8) -> u8 {
    let t = u16::from(t);
    let av = mul_div255_u16(u16::from(a), 255 - t);
    let bv = mul_div255_u16(u16::from(b), t);
    (av + bv).min(255) as u8
}

pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
