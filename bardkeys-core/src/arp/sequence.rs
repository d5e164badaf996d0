//! Arpeggio sequence generation. Pure: no timing, no output.

use bardkeys_types::{ArpPattern, Note};

use crate::keymap::NoteActionMap;

/// Small LCG, good enough for shuffling a handful of notes.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Seeded from the clock.
    pub fn from_time() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x2545_F491_4F6C_DD1D);
        Self(nanos)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    /// Uniform-ish index in `0..bound`.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() as usize) % bound.max(1)
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

/// Held notes spread over `octaves`, mapped only, ascending, without repeats.
fn extended(held: &[Note], octaves: u8, keymap: &NoteActionMap) -> Vec<Note> {
    let mut notes: Vec<Note> = (0..octaves.max(1) as i32)
        .flat_map(|octave| held.iter().filter_map(move |n| n.transpose(octave * 12)))
        .filter(|n| keymap.is_mapped(*n))
        .collect();
    notes.sort();
    notes.dedup();
    notes
}

/// Scale degrees from the lowest held note, mapped only, ascending, without repeats.
fn scale(held: &[Note], intervals: &[i32], octaves: u8, keymap: &NoteActionMap) -> Vec<Note> {
    let Some(root) = held.iter().min().copied() else {
        return Vec::new();
    };
    let mut notes: Vec<Note> = (0..octaves.max(1) as i32)
        .flat_map(|octave| {
            intervals
                .iter()
                .filter_map(move |&i| root.transpose(octave * 12 + i))
        })
        .filter(|n| keymap.is_mapped(*n))
        .collect();
    notes.sort();
    notes.dedup();
    notes
}

/// One full pass of the arpeggio for the notes currently held.
///
/// `held` is in the order the notes were pressed. `AsPlayed` keeps that
/// order and ignores the octave span; it may contain unmapped notes, which
/// playback skips.
pub fn generate_sequence(
    held: &[Note],
    pattern: ArpPattern,
    octaves: u8,
    keymap: &NoteActionMap,
    rng: &mut Lcg,
) -> Vec<Note> {
    if held.is_empty() {
        return Vec::new();
    }
    if let Some(intervals) = pattern.scale_intervals() {
        return scale(held, intervals, octaves, keymap);
    }

    match pattern {
        ArpPattern::AsPlayed => held.to_vec(),
        ArpPattern::Up => extended(held, octaves, keymap),
        ArpPattern::Down => {
            let mut notes = extended(held, octaves, keymap);
            notes.reverse();
            notes
        }
        ArpPattern::UpDown => {
            let mut notes = extended(held, octaves, keymap);
            if notes.len() > 2 {
                let inner: Vec<Note> = notes[1..notes.len() - 1].iter().rev().copied().collect();
                notes.extend(inner);
            }
            notes
        }
        ArpPattern::Random => {
            let mut notes = extended(held, octaves, keymap);
            rng.shuffle(&mut notes);
            notes
        }
        // Scale patterns returned above.
        _ => extended(held, octaves, keymap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(raw: &[u8]) -> Vec<Note> {
        raw.iter().map(|&r| Note::new(r).unwrap()).collect()
    }

    fn raw(notes: &[Note]) -> Vec<u8> {
        notes.iter().map(|n| n.get()).collect()
    }

    fn gen(held: &[u8], pattern: ArpPattern, octaves: u8) -> Vec<u8> {
        let map = NoteActionMap::new();
        let mut rng = Lcg::new(7);
        raw(&generate_sequence(&notes(held), pattern, octaves, &map, &mut rng))
    }

    #[test]
    fn up_sorts_and_extends() {
        assert_eq!(gen(&[64, 60, 67], ArpPattern::Up, 1), vec![60, 64, 67]);
        assert_eq!(gen(&[48, 52], ArpPattern::Up, 2), vec![48, 52, 60, 64]);
    }

    #[test]
    fn extension_drops_unmapped_octaves() {
        // 67 + 12 = 79 is off the instrument.
        assert_eq!(gen(&[60, 67], ArpPattern::Up, 2), vec![60, 67, 72]);
    }

    #[test]
    fn down_is_reverse_of_up() {
        assert_eq!(gen(&[60, 64, 67], ArpPattern::Down, 1), vec![67, 64, 60]);
        let mut up = gen(&[50, 55, 59, 62], ArpPattern::Up, 2);
        up.reverse();
        assert_eq!(gen(&[50, 55, 59, 62], ArpPattern::Down, 2), up);
    }

    #[test]
    fn up_down_does_not_repeat_endpoints() {
        assert_eq!(
            gen(&[60, 64, 67, 71], ArpPattern::UpDown, 1),
            vec![60, 64, 67, 71, 67, 64]
        );
        assert_eq!(gen(&[60, 64], ArpPattern::UpDown, 1), vec![60, 64]);
        assert_eq!(gen(&[60], ArpPattern::UpDown, 1), vec![60]);
    }

    #[test]
    fn random_is_a_permutation_of_up() {
        let mut shuffled = gen(&[48, 52, 55, 60, 64], ArpPattern::Random, 1);
        shuffled.sort();
        assert_eq!(shuffled, vec![48, 52, 55, 60, 64]);
    }

    #[test]
    fn as_played_keeps_press_order() {
        assert_eq!(gen(&[67, 60, 64], ArpPattern::AsPlayed, 3), vec![67, 60, 64]);
    }

    #[test]
    fn scales_start_from_lowest_held_note() {
        assert_eq!(
            gen(&[55, 48], ArpPattern::Pentatonic, 1),
            vec![48, 50, 52, 55, 57]
        );
        assert_eq!(
            gen(&[60], ArpPattern::BluesScale, 1),
            vec![60, 63, 65, 66, 67, 70]
        );
        // Second octave of C4 chromatic runs off the top of the instrument.
        assert_eq!(gen(&[60], ArpPattern::Chromatic, 2), (60..=72).collect::<Vec<u8>>());
    }

    #[test]
    fn up_is_non_decreasing_for_any_held_set() {
        let map = NoteActionMap::new();
        let mut rng = Lcg::new(42);
        for _ in 0..50 {
            let count = rng.below(6) + 1;
            let held: Vec<Note> = (0..count)
                .filter_map(|_| Note::new(40 + rng.below(40) as u8))
                .collect();
            for octaves in 1..=4 {
                let seq = generate_sequence(&held, ArpPattern::Up, octaves, &map, &mut rng);
                assert!(seq.windows(2).all(|w| w[0] <= w[1]));
                assert!(seq.iter().all(|n| map.is_mapped(*n)));
            }
        }
    }

    #[test]
    fn empty_held_set_gives_empty_sequence() {
        assert!(gen(&[], ArpPattern::Up, 1).is_empty());
        assert!(gen(&[], ArpPattern::Dorian, 1).is_empty());
    }
}
