/// Random encounter rolls.
use rand::Rng;

/// Decide whether an encounter fires and, if so, which one.
///
/// Draws a uniform `[0, 1)` value against `chance`, then picks uniformly
/// from `pool`. An empty pool never fires and consumes no randomness.
pub fn resolve_encounter<'p, R: Rng + ?Sized>(
    pool: &'p [String],
    chance: f64,
    rng: &mut R,
) -> Option<&'p str> {
    if pool.is_empty() || chance <= 0.0 {
        return None;
    }
    let roll: f64 = rng.gen();
    if roll >= chance {
        return None;
    }
    let pick = rng.gen_range(0..pool.len());
    Some(pool[pick].as_str())
}
