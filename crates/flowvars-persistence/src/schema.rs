//! Esquema Diesel de los registros de variables. Reemplazable con `diesel print-schema`.

diesel::table! {
    runtime_variables (instance_id, scope_id, name) {
        instance_id -> Uuid,
        scope_id -> Integer,
        name -> Text,
        value_type -> Text,
        text_value -> Nullable<Text>,
        text2_value -> Nullable<Text>,
        long_value -> Nullable<BigInt>,
        double_value -> Nullable<Double>,
        bytes_value -> Nullable<Bytea>,
        serialization_format -> Nullable<Text>,
        revision -> BigInt,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    historic_variables (seq) {
        seq -> BigInt,
        instance_id -> Uuid,
        scope_id -> Integer,
        name -> Text,
        value_type -> Text,
        text_value -> Nullable<Text>,
        text2_value -> Nullable<Text>,
        long_value -> Nullable<BigInt>,
        double_value -> Nullable<Double>,
        bytes_value -> Nullable<Bytea>,
        serialization_format -> Nullable<Text>,
        revision -> BigInt,
        created -> Bool,
        recorded_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    runtime_variables,
    historic_variables,
);
