//! EAN/UPC scanline recognizer: pure Rust, no platform APIs.
//!
//! Samples horizontal scanlines across the frame, binarizes each at the
//! midpoint of its min/max luminance, and looks for the bar pattern of an
//! EAN-13, EAN-8 or UPC-E symbol. A candidate is accepted only when the
//! check digit validates. UPC-A symbols decode as EAN-13 with a leading
//! zero, and UPC-E symbols are expanded to that same 13-digit form.

use super::{CodeRecognizer, DetectorCapability, ProductCode};
use crate::error::DetectError;
use image::DynamicImage;

/// Scanlines sampled per frame.
const SCANLINES: u32 = 16;
/// Minimum luminance spread for a row to be worth decoding.
const MIN_CONTRAST: u8 = 40;

/// Left-hand odd-parity ("L") patterns, 7 modules each, MSB first, 1 = bar.
const L_CODES: [u8; 10] = [
    0b0001101, 0b0011001, 0b0010011, 0b0111101, 0b0100011,
    0b0110001, 0b0101111, 0b0111011, 0b0110111, 0b0001011,
];

/// Which of the six left digits use even parity ("G"), per leading digit.
/// MSB is the leftmost digit.
const FIRST_DIGIT_PARITY: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011,
    0b011001, 0b011100, 0b010101, 0b010110, 0b011010,
];

/// UPC-E even-parity digits per check digit, number system 0.
/// Number system 1 uses the complement.
const UPCE_PARITY: [u8; 10] = [
    0b111000, 0b110100, 0b110010, 0b110001, 0b101100,
    0b100110, 0b100011, 0b101010, 0b101001, 0b100101,
];

fn r_code(digit: usize) -> u8 {
    !L_CODES[digit] & 0x7F
}

fn g_code(digit: usize) -> u8 {
    r_code(digit).reverse_bits() >> 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbology {
    Ean13,
    Ean8,
    UpcE,
}

impl Symbology {
    /// Longest first: a shorter symbol's run pattern can show up inside a
    /// longer one.
    const ALL: [Symbology; 3] = [Symbology::Ean13, Symbology::Ean8, Symbology::UpcE];

    /// Modules in a full symbol, excluding quiet zones.
    fn modules(self) -> f64 {
        match self {
            Symbology::Ean13 => 95.0,
            Symbology::Ean8 => 67.0,
            Symbology::UpcE => 51.0,
        }
    }

    /// Bar/space runs in a full symbol.
    fn runs(self) -> usize {
        match self {
            Symbology::Ean13 => 59, // 3 + 6*4 + 5 + 6*4 + 3
            Symbology::Ean8 => 43,  // 3 + 4*4 + 5 + 4*4 + 3
            Symbology::UpcE => 33,  // 3 + 6*4 + 6
        }
    }
}

/// Narrowest symbol we decode, in modules.
const MIN_SYMBOL_MODULES: f64 = 51.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct EanRecognizer;

impl CodeRecognizer for EanRecognizer {
    fn capability(&self) -> DetectorCapability {
        DetectorCapability::Available
    }

    fn recognize(&self, frame: &DynamicImage) -> Result<Option<ProductCode>, DetectError> {
        let gray = frame.to_luma8();
        let (width, height) = gray.dimensions();
        if (width as f64) < MIN_SYMBOL_MODULES || height == 0 {
            return Err(DetectError(format!("frame too small ({}x{})", width, height)));
        }

        for k in 1..SCANLINES {
            let y = (height * k / SCANLINES).min(height - 1);
            let row: Vec<u8> = (0..width).map(|x| gray.get_pixel(x, y).0[0]).collect();
            if let Some(code) = decode_row(&row) {
                return Ok(ProductCode::new(code));
            }
        }
        Ok(None)
    }
}

/// Decode one scanline in either direction. Returns 13 digits for EAN-13,
/// UPC-A and UPC-E, 8 digits for EAN-8.
pub fn decode_row(row: &[u8]) -> Option<String> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    if max.saturating_sub(min) < MIN_CONTRAST {
        return None;
    }
    let threshold = ((min as u16 + max as u16) / 2) as u8;
    let runs = run_lengths(row.iter().map(|&px| px < threshold));
    let reversed: Vec<(bool, usize)> = runs.iter().rev().copied().collect();

    Symbology::ALL.iter().find_map(|&symbology| {
        find_symbol(symbology, &runs).or_else(|| find_symbol(symbology, &reversed))
    })
}

fn find_symbol(symbology: Symbology, runs: &[(bool, usize)]) -> Option<String> {
    let len = symbology.runs();
    if runs.len() < len {
        return None;
    }
    (0..=runs.len() - len)
        .filter(|&start| runs[start].0)
        .find_map(|start| decode_symbol(symbology, &runs[start..start + len]))
}

/// Collapse a bar/space sequence into (is_bar, width) runs.
fn run_lengths(pixels: impl Iterator<Item = bool>) -> Vec<(bool, usize)> {
    let mut runs: Vec<(bool, usize)> = Vec::new();
    for dark in pixels {
        match runs.last_mut() {
            Some((color, width)) if *color == dark => *width += 1,
            _ => runs.push((dark, 1)),
        }
    }
    runs
}

fn decode_symbol(symbology: Symbology, runs: &[(bool, usize)]) -> Option<String> {
    let total: usize = runs.iter().map(|(_, w)| w).sum();
    let module = total as f64 / symbology.modules();
    if module < 1.0 {
        return None;
    }
    let guard_ok = |slice: &[(bool, usize)]| {
        slice
            .iter()
            .all(|(_, w)| (*w as f64 / module - 1.0).abs() < 0.6)
    };

    let digits: Vec<u8> = match symbology {
        Symbology::Ean13 => {
            if !guard_ok(&runs[0..3]) || !guard_ok(&runs[27..32]) || !guard_ok(&runs[56..59]) {
                return None;
            }
            let (left, parity) = left_digits(&runs[3..27], 6)?;
            let first = FIRST_DIGIT_PARITY.iter().position(|&p| p == parity)? as u8;
            let right = right_digits(&runs[32..56], 6)?;
            std::iter::once(first).chain(left).chain(right).collect()
        }
        Symbology::Ean8 => {
            if !guard_ok(&runs[0..3]) || !guard_ok(&runs[19..24]) || !guard_ok(&runs[40..43]) {
                return None;
            }
            let (left, parity) = left_digits(&runs[3..19], 4)?;
            if parity != 0 {
                return None;
            }
            let right = right_digits(&runs[24..40], 4)?;
            left.into_iter().chain(right).collect()
        }
        Symbology::UpcE => {
            if !guard_ok(&runs[0..3]) || !guard_ok(&runs[27..33]) {
                return None;
            }
            let (body, parity) = left_digits(&runs[3..27], 6)?;
            let (system, check) = (0..10u8).find_map(|c| {
                let even = UPCE_PARITY[c as usize];
                if even == parity {
                    Some((0, c))
                } else if even ^ 0b111111 == parity {
                    Some((1, c))
                } else {
                    None
                }
            })?;
            let mut digits = expand_upce(system, &body);
            digits.push(check);
            digits
        }
    };

    if !check_digit_ok(&digits) {
        return None;
    }
    Some(digits.iter().map(|d| char::from(b'0' + d)).collect())
}

/// Left-half digits, L or G coded. Returns the digits and the parity mask
/// (1 = G, MSB is the leftmost digit).
fn left_digits(runs: &[(bool, usize)], count: usize) -> Option<(Vec<u8>, u8)> {
    let mut digits = Vec::with_capacity(count);
    let mut parity = 0u8;
    for i in 0..count {
        let pattern = digit_pattern(&runs[i * 4..i * 4 + 4])?;
        let (digit, even) = (0..10).find_map(|d| {
            if L_CODES[d] == pattern {
                Some((d, false))
            } else if g_code(d) == pattern {
                Some((d, true))
            } else {
                None
            }
        })?;
        digits.push(digit as u8);
        parity = (parity << 1) | even as u8;
    }
    Some((digits, parity))
}

fn right_digits(runs: &[(bool, usize)], count: usize) -> Option<Vec<u8>> {
    (0..count)
        .map(|i| {
            let pattern = digit_pattern(&runs[i * 4..i * 4 + 4])?;
            (0..10).find(|&d| r_code(d) == pattern).map(|d| d as u8)
        })
        .collect()
}

/// Six UPC-E digits → the first twelve digits of the equivalent EAN-13
/// (leading zero, number system, ten data digits).
fn expand_upce(system: u8, d: &[u8]) -> Vec<u8> {
    let data: [u8; 10] = match d[5] {
        0..=2 => [d[0], d[1], d[5], 0, 0, 0, 0, d[2], d[3], d[4]],
        3 => [d[0], d[1], d[2], 0, 0, 0, 0, 0, d[3], d[4]],
        4 => [d[0], d[1], d[2], d[3], 0, 0, 0, 0, 0, d[4]],
        _ => [d[0], d[1], d[2], d[3], d[4], 0, 0, 0, 0, d[5]],
    };
    [0, system].into_iter().chain(data).collect()
}

/// Four runs spanning seven modules → 7-bit pattern, 1 = bar.
fn digit_pattern(runs: &[(bool, usize)]) -> Option<u8> {
    let total: usize = runs.iter().map(|(_, w)| w).sum();
    let mut pattern = 0u8;
    let mut modules = 0;
    for (dark, width) in runs {
        let m = ((*width as f64 * 7.0) / total as f64).round().clamp(1.0, 4.0) as u32;
        modules += m;
        for _ in 0..m {
            pattern = (pattern << 1) | *dark as u8;
        }
    }
    (modules == 7).then_some(pattern)
}

/// Mod-10 check: weight 3 on the data digit next to the check digit,
/// alternating with 1 leftwards.
fn check_digit_ok(digits: &[u8]) -> bool {
    let Some((&check, data)) = digits.split_last() else {
        return false;
    };
    let sum: u32 = data
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    (10 - sum % 10) % 10 == check as u32
}
