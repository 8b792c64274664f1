use std::sync::OnceLock;

fn parse_env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

static MAX_RESOLUTION_ROUNDS: OnceLock<usize> = OnceLock::new();

/// Cap on row-number resolution rounds. The fixpoint usually converges in a
/// handful of rounds; exhausting the cap aborts the attempt.
pub(crate) fn max_resolution_rounds() -> usize {
    *MAX_RESOLUTION_ROUNDS
        .get_or_init(|| parse_env_usize("PDF417_MAX_RESOLUTION_ROUNDS", 64).clamp(1, 1024))
}

static MAX_ADJUSTMENT_STEPS: OnceLock<usize> = OnceLock::new();

/// Cap on module-width repair steps per codeword.
pub(crate) fn max_adjustment_steps() -> usize {
    *MAX_ADJUSTMENT_STEPS
        .get_or_init(|| parse_env_usize("PDF417_MAX_ADJUSTMENT_STEPS", 64).clamp(8, 1024))
}

static MAX_AMBIGUOUS_TRIES: OnceLock<usize> = OnceLock::new();

/// Cap on ambiguous-cell value combinations tried against the corrector.
pub(crate) fn max_ambiguous_tries() -> usize {
    *MAX_AMBIGUOUS_TRIES
        .get_or_init(|| parse_env_usize("PDF417_MAX_AMBIGUOUS_TRIES", 100).clamp(1, 10_000))
}
