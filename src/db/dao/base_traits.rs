use sea_orm::entity::prelude::DateTimeWithTimeZone;

pub trait HasIdActiveModel {
    fn set_id(&mut self, id: uuid::Uuid);
}

pub trait TimestampedActiveModel {
    fn set_created_at(&mut self, ts: DateTimeWithTimeZone);
    fn set_updated_at(&mut self, ts: DateTimeWithTimeZone);
}

/// Implements the id/timestamp setters for entities keyed by a generated UUID.
macro_rules! uuid_timestamped {
    ($($entity:ident),+ $(,)?) => {
        $(
            impl HasIdActiveModel for crate::db::entities::$entity::ActiveModel {
                fn set_id(&mut self, id: uuid::Uuid) {
                    self.id = sea_orm::ActiveValue::Set(id);
                }
            }

            impl TimestampedActiveModel for crate::db::entities::$entity::ActiveModel {
                fn set_created_at(&mut self, ts: DateTimeWithTimeZone) {
                    self.created_at = sea_orm::ActiveValue::Set(ts);
                }

                fn set_updated_at(&mut self, ts: DateTimeWithTimeZone) {
                    self.updated_at = sea_orm::ActiveValue::Set(ts);
                }
            }
        )+
    };
}

uuid_timestamped!(user, role, permission, role_permission, oauth_provider);
