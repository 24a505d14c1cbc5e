#![allow(dead_code)]

use refcode::RefcodeObject;

#[derive(Default, RefcodeObject)]
struct Reading {
    #[refcode(rename = "value")]
    raw: i64,
    value: i64,
}

fn main() {}
