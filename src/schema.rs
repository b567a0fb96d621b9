// dbgraph schema - local key/value store for offline state

diesel::table! {
    local_store (key) {
        key -> Text,
        value -> Text,
        updated_at -> Text,
    }
}
