use rand::seq::SliceRandom;

const ADJECTIVES: [&str; 24] = [
    "swift", "bright", "calm", "deep", "eager", "fair", "gentle", "happy", "keen", "light",
    "mild", "noble", "proud", "quick", "rich", "safe", "true", "vivid", "warm", "wise", "bold",
    "cool", "dark", "fast",
];

const NOUNS: [&str; 24] = [
    "fox", "owl", "wolf", "bear", "hawk", "lion", "deer", "crow", "dove", "seal", "swan",
    "hare", "lynx", "moth", "newt", "orca", "pike", "rook", "toad", "vole", "wren", "yak",
    "bass", "crab",
];

/// `adjective-noun` session titles for users who do not name their sessions.
/// The title doubles as the worktree branch name, so it stays branch-safe.
pub fn generate_title() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).expect("non-empty list");
    let noun = NOUNS.choose(&mut rng).expect("non-empty list");
    format!("{adjective}-{noun}")
}
