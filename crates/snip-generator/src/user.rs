use uuid::Uuid;

/// Source of fresh anonymous user ids.
pub trait UserIdGenerator: Send + Sync + 'static {
    fn new_user_id(&self) -> String;
}

/// Issues random v4 UUIDs as user ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl UserIdGenerator for UuidGenerator {
    fn new_user_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_uuids() {
        let generator = UuidGenerator;
        let first = generator.new_user_id();
        let second = generator.new_user_id();

        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
