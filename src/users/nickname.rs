use rand::{seq::SliceRandom, Rng};

const ADJECTIVES: &[&str] = &[
    "clever", "brave", "calm", "eager", "gentle", "happy", "jolly", "keen", "lively", "merry",
    "nimble", "proud", "quick", "quiet", "sly", "swift", "witty", "zesty",
];

const ANIMALS: &[&str] = &[
    "badger", "crane", "dolphin", "falcon", "fox", "heron", "ibex", "koala", "lynx", "otter",
    "panda", "puffin", "raven", "seal", "tiger", "walrus", "wolf", "yak",
];

/// `adjective_animal_NNN`, always matching the nickname rules.
pub fn generate_nickname() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("otter");
    format!("{adjective}_{animal}_{}", rng.gen_range(0..1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::validation::nickname_problem;

    #[test]
    fn generated_nicknames_pass_validation() {
        for _ in 0..200 {
            let nick = generate_nickname();
            assert_eq!(nickname_problem(&nick), None, "{nick}");
            assert_eq!(nick.split('_').count(), 3);
        }
    }
}
