/// Align `value` down to the nearest multiple of `alignment`.
/// If `alignment` is zero, the input is returned unchanged.
#[inline(always)]
pub const fn align_down_u32(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    value & !(alignment - 1)
}

/// Align `value` up to the nearest multiple of `alignment`.
/// If `alignment` is zero, the input is returned unchanged.
#[inline(always)]
pub const fn align_up_u32(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    let adjusted = value.saturating_add(alignment - 1);
    adjusted & !(alignment - 1)
}

/// Align `value` up, returning `None` if the result does not fit.
#[inline(always)]
pub const fn checked_align_up_u32(value: u32, alignment: u32) -> Option<u32> {
    if alignment == 0 {
        return Some(value);
    }
    match value.checked_add(alignment - 1) {
        Some(adjusted) => Some(adjusted & !(alignment - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(align_up_u32(0, 4096), 0);
        assert_eq!(align_up_u32(1, 4096), 4096);
        assert_eq!(align_up_u32(4096, 4096), 4096);
        assert_eq!(align_down_u32(4097, 4096), 4096);
        assert_eq!(align_down_u32(7, 0), 7);
        assert_eq!(checked_align_up_u32(u32::MAX - 10, 4096), None);
        assert_eq!(checked_align_up_u32(8193, 4096), Some(12288));
    }
}
