pub const fn pad_4(x: usize) -> usize {
    (x + 3) & !3
}

pub const fn div_ceil(value: u32, divisor: u32) -> u32 {
    if divisor == 0 { 0 } else { value.div_ceil(divisor) }
}

/// smallest `s` with `s * s >= n`
pub fn sqrt_ceil(n: u32) -> u32 {
    let mut s = (n as f64).sqrt() as u32;
    while (s as u64) * (s as u64) < n as u64 {
        s += 1;
    }
    while s > 0 && ((s - 1) as u64) * ((s - 1) as u64) >= n as u64 {
        s -= 1;
    }
    s
}
