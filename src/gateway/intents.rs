/// Gateway intent bits requested during IDENTIFY.
pub const GUILDS: u64 = 1 << 0;
pub const GUILD_MEMBERS: u64 = 1 << 1;
pub const GUILD_MESSAGES: u64 = 1 << 9;
pub const MESSAGE_CONTENT: u64 = 1 << 15;

/// The capability set this client identifies with: enough to populate
/// guild/channel/relationship state and observe message events.
pub fn default_intents() -> u64 {
    GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | MESSAGE_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intents_bitmask() {
        assert_eq!(default_intents(), 33283);
    }

    #[test]
    fn test_intent_bits_are_disjoint() {
        let bits = [GUILDS, GUILD_MEMBERS, GUILD_MESSAGES, MESSAGE_CONTENT];
        for (i, a) in bits.iter().enumerate() {
            for b in &bits[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }
}
