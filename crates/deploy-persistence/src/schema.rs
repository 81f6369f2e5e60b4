//! Esquema Diesel. Reemplazable con `diesel print-schema`.

diesel::table! {
    ledger_events (seq) {
        seq -> BigInt,
        network -> Text,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}
