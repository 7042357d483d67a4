//! Small integer helpers shared by the on-disk/on-wire formats.

/// Returns `2^n`, grounded in the teacher's `math::pow2` used to turn a
/// superblock's `log_block_size`/`log_frag_size` field into a byte count.
pub const fn pow2(n: u32) -> usize {
	1usize << n
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pow2_basic() {
		assert_eq!(pow2(0), 1);
		assert_eq!(pow2(10), 1024);
	}
}
