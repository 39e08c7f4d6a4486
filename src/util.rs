//! Allocation-free integer to decimal ASCII.

/// Longest decimal rendering of an `i64`: 19 digits plus a sign.
pub const MAX_I64_DIGITS: usize = 20;

const fn digit_tens() -> [u8; 100] {
    let mut t = [0u8; 100];
    let mut i = 0;
    while i < 100 {
        t[i] = b'0' + (i / 10) as u8;
        i += 1;
    }
    t
}

const fn digit_ones() -> [u8; 100] {
    let mut t = [0u8; 100];
    let mut i = 0;
    while i < 100 {
        t[i] = b'0' + (i % 10) as u8;
        i += 1;
    }
    t
}

static DIGIT_TENS: [u8; 100] = digit_tens();
static DIGIT_ONES: [u8; 100] = digit_ones();

/// Render `value` as decimal ASCII into the tail of `scratch` and return the used suffix.
///
/// Digits are produced least-significant first. The value is folded into the negative
/// domain so `i64::MIN` needs no special case.
///
/// ```
/// use packstream::util::{format_i64, MAX_I64_DIGITS};
/// let mut scratch = [0u8; MAX_I64_DIGITS];
/// assert_eq!(format_i64(-1024, &mut scratch), b"-1024");
/// assert_eq!(format_i64(i64::MIN, &mut scratch), b"-9223372036854775808");
/// ```
pub fn format_i64(value: i64, scratch: &mut [u8; MAX_I64_DIGITS]) -> &[u8] {
    let negative = value < 0;
    let mut i = if negative { value } else { -value };
    let mut pos = MAX_I64_DIGITS;

    // two digits per step until the remainder fits an i32
    while i <= i64::from(i32::MIN) {
        let q = i / 100;
        let r = (q * 100 - i) as usize;
        i = q;
        pos -= 1;
        scratch[pos] = DIGIT_ONES[r];
        pos -= 1;
        scratch[pos] = DIGIT_TENS[r];
    }

    let mut j = i as i32;
    loop {
        let q = j / 10;
        let r = q * 10 - j;
        pos -= 1;
        scratch[pos] = b'0' + r as u8;
        j = q;
        if j == 0 {
            break;
        }
    }

    if negative {
        pos -= 1;
        scratch[pos] = b'-';
    }
    &scratch[pos..]
}
