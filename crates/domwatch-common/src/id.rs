use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

/// Default bucket used when [`init`] was never called, which keeps unit
/// tests independent of startup order.
const DEFAULT_MACHINE: i32 = 1;
const DEFAULT_NODE: i32 = 1;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Configure the process-wide snowflake generator.
///
/// `machine_id` and `node_id` each range 0-31; together they keep IDs
/// unique across server instances sharing a database.
pub fn init(machine_id: i32, node_id: i32) {
    *ID_GENERATOR.lock().unwrap() = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Next snowflake ID, rendered as a decimal string for storage keys.
pub fn next_id() -> String {
    let mut guard = ID_GENERATOR.lock().unwrap();
    guard
        .get_or_insert_with(|| SnowflakeIdBucket::new(DEFAULT_MACHINE, DEFAULT_NODE))
        .get_id()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_within_a_burst() {
        init(1, 1);
        let ids: HashSet<String> = (0..1000).map(|_| next_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn ids_parse_as_i64() {
        let id = next_id();
        assert!(id.parse::<i64>().is_ok(), "ID should be a valid i64: {id}");
    }
}
