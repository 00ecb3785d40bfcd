// Response envelope normalization
//
// Backend generations disagree on how a successful payload is wrapped:
//
//   current:  { "success": true, "data": <payload> }
//             { "success": true, "data": { "pacientes": [...] , "total": 3 } }
//   legacy:   { "pacientes": [...] }   { "paciente": {...} }
//   bare:     [...] / {...}
//
// `normalize` collapses all of them into the bare payload. The checks run
// in a fixed order and the first hit wins:
//
//   | # | shape                                          | result              |
//   |---|------------------------------------------------|---------------------|
//   | 1 | truthy `success` + `data` present              | `data`, or its first|
//   |   |                                                | WRAPPED_COLLECTIONS |
//   |   |                                                | array if `data` is  |
//   |   |                                                | a non-array object  |
//   | 2 | a LEGACY_COLLECTIONS field holding an array    | that array          |
//   | 3 | a SINGULAR_ENTITIES field that is not null     | that entity         |
//   | 4 | anything else                                  | unchanged           |
//
// Collections beat singular entities, and the wrapper beats legacy fields.
//
// Known limit: idempotence holds for every shape above except a wrapped
// entity that itself carries a SINGULAR_ENTITIES field. The first pass
// turns `{ success, data: { id: 3, paciente: {...} } }` into
// `{ id: 3, paciente: {...} }`, which a second pass reads as row 3.
// Callers must normalize a reply exactly once.

use serde_json::Value;

/// Collection names looked for inside a `{ success, data: {...} }` wrapper.
pub const WRAPPED_COLLECTIONS: &[&str] = &[
    "pacientes",
    "citas",
    "resultados",
    "facturas",
    "estudios",
    "usuarios",
    "movimientos",
];

/// Collection names legacy endpoints return at the top level.
pub const LEGACY_COLLECTIONS: &[&str] = &[
    "facturas",
    "pacientes",
    "resultados",
    "ordenes",
    "estudios",
    "usuarios",
    "citas",
];

/// Singular entity names legacy endpoints return at the top level.
pub const SINGULAR_ENTITIES: &[&str] = &[
    "paciente",
    "cita",
    "resultado",
    "factura",
    "estudio",
    "usuario",
];

/// Reduce any successful payload to its canonical form.
pub fn normalize(raw: Value) -> Value {
    let Value::Object(mut obj) = raw else {
        return raw;
    };

    // 1. Current-generation wrapper.
    if obj.get("success").is_some_and(is_truthy) {
        if let Some(data) = obj.remove("data") {
            return unwrap_collection(data, WRAPPED_COLLECTIONS);
        }
    }

    // 2. Legacy top-level collection.
    if let Some(key) = find_array_field(&obj, LEGACY_COLLECTIONS) {
        if let Some(list) = obj.remove(key) {
            return list;
        }
    }

    // 3. Legacy top-level singular entity.
    if let Some(key) = SINGULAR_ENTITIES
        .iter()
        .copied()
        .find(|key| obj.get(*key).is_some_and(|v| !v.is_null()))
    {
        if let Some(entity) = obj.remove(key) {
            return entity;
        }
    }

    // 4. Already canonical.
    Value::Object(obj)
}

fn unwrap_collection(data: Value, names: &[&str]) -> Value {
    match data {
        Value::Object(mut inner) => match find_array_field(&inner, names) {
            Some(key) => inner.remove(key).unwrap_or(Value::Null),
            None => Value::Object(inner),
        },
        other => other,
    }
}

fn find_array_field<'a>(obj: &serde_json::Map<String, Value>, names: &[&'a str]) -> Option<&'a str> {
    names
        .iter()
        .copied()
        .find(|name| obj.get(*name).is_some_and(Value::is_array))
}

/// JavaScript-style truthiness; the wrapper flag has been sent as a bool,
/// a number and a string by different backends.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn shapes() -> Vec<Value> {
        vec![
            json!({ "success": true, "data": { "pacientes": [{ "id": 1 }, { "id": 2 }] } }),
            json!({ "success": true, "data": { "id": 9, "nombre": "Hemograma" } }),
            json!({ "success": true, "data": [1, 2, 3] }),
            json!({ "success": true, "data": null }),
            json!({ "facturas": [{ "numero": "B02-1" }], "total": 1 }),
            json!({ "paciente": { "id": 1 } }),
            json!({ "cita": { "id": 4, "estado": "programada" } }),
            json!({ "id": 1, "nombre": "Ana" }),
            json!([{ "id": 1 }]),
            json!("ok"),
            json!(null),
            json!({ "success": false, "message": "nope" }),
        ]
    }

    #[test]
    fn wrapped_collection_beats_wrapper() {
        let raw = json!({ "success": true, "data": { "pacientes": [{ "id": "A" }, { "id": "B" }] } });
        assert_eq!(normalize(raw), json!([{ "id": "A" }, { "id": "B" }]));
    }

    #[test]
    fn wrapped_entity_is_returned_as_is() {
        let raw = json!({ "success": true, "data": { "id": 3, "total": 100 } });
        assert_eq!(normalize(raw), json!({ "id": 3, "total": 100 }));
    }

    #[test]
    fn wrapped_null_payload_stays_null() {
        assert_eq!(normalize(json!({ "success": true, "data": null })), Value::Null);
    }

    #[test]
    fn wrapped_collection_respects_table_order() {
        let raw = json!({ "success": 1, "data": { "facturas": [1], "citas": [2] } });
        assert_eq!(normalize(raw), json!([2]));
    }

    #[test]
    fn wrapper_without_data_falls_through_to_legacy() {
        let raw = json!({ "success": true, "usuarios": [{ "id": 1 }] });
        assert_eq!(normalize(raw), json!([{ "id": 1 }]));
    }

    #[test]
    fn falsy_success_is_not_a_wrapper() {
        let raw = json!({ "success": false, "data": { "id": 1 } });
        assert_eq!(normalize(raw.clone()), raw);
    }

    #[test]
    fn legacy_singular_entity() {
        assert_eq!(normalize(json!({ "paciente": { "id": 1 } })), json!({ "id": 1 }));
    }

    #[test]
    fn legacy_collection_beats_singular_entity() {
        let raw = json!({ "paciente": { "id": 1 }, "ordenes": [{ "id": 2 }] });
        assert_eq!(normalize(raw), json!([{ "id": 2 }]));
    }

    #[test]
    fn legacy_collection_must_be_an_array() {
        let raw = json!({ "facturas": 3, "factura": { "id": 5 } });
        assert_eq!(normalize(raw), json!({ "id": 5 }));
    }

    #[test]
    fn null_singular_entity_is_skipped() {
        let raw = json!({ "paciente": null, "cita": { "id": 8 } });
        assert_eq!(normalize(raw), json!({ "id": 8 }));

        let raw = json!({ "paciente": null });
        assert_eq!(normalize(raw.clone()), raw);
    }

    #[test]
    fn canonical_values_pass_through() {
        for raw in [json!([1, 2]), json!({ "id": 1 }), json!(42), Value::Null] {
            assert_eq!(normalize(raw.clone()), raw);
        }
    }

    #[test]
    fn wrapped_entity_with_nested_singular_field_is_not_idempotent() {
        let raw = json!({ "success": true, "data": { "id": 3, "paciente": { "id": 1 } } });
        let once = normalize(raw);
        assert_eq!(once, json!({ "id": 3, "paciente": { "id": 1 } }));
        assert_eq!(normalize(once), json!({ "id": 1 }));
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in shapes() {
            let once = normalize(raw.clone());
            let twice = normalize(once.clone());
            assert_eq!(twice, once, "not idempotent for {raw}");
        }
    }
}
