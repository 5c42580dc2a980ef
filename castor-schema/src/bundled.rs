use crate::migration::MigrationDefinition;

const MIGRATIONS: &[(&str, i64, &str)] = &[
    (
        "0000_core",
        1_767_225_600_000,
        include_str!("../migrations/0000_core.sql"),
    ),
    (
        "0001_documents",
        1_769_904_000_000,
        include_str!("../migrations/0001_documents.sql"),
    ),
];

/// Migrations compiled into this crate, oldest first.
pub fn bundled_migrations() -> Vec<MigrationDefinition> {
    MIGRATIONS
        .iter()
        .map(|(tag, millis, source)| MigrationDefinition::from_source(*tag, *millis, source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_migrations_are_ordered_by_folder_millis() {
        let migrations = bundled_migrations();
        assert_eq!(migrations.len(), 2);
        assert!(
            migrations
                .windows(2)
                .all(|w| w[0].folder_millis < w[1].folder_millis)
        );
        assert!(migrations.iter().all(|m| !m.sql.is_empty()));
    }
}
