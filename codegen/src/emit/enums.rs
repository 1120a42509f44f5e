// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use super::Code;
use crate::names;
use crate::schema::Schema;

pub(crate) fn emit(code: &mut Code, schema: &Schema) {
    for e in &schema.enums {
        code.blank();
        code.open("xenapi_wire::wire_enum!");
        code.doc(&e.doc);
        code.open(format!("pub enum {}: {:?}", names::enum_name(&e.name), e.name));
        for value in &e.values {
            code.doc(&value.doc);
            code.line(format!(
                "{} => {:?},",
                names::variant_name(&value.name),
                value.name
            ));
        }
        code.close();
        code.close();
    }
}
