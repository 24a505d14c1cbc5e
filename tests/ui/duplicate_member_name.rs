#![allow(dead_code)]

use refcode::RefcodeEnum;

#[derive(Clone, Copy, RefcodeEnum)]
enum Shade {
    #[refcode(rename = "Dark")]
    Black,
    Dark,
}

fn main() {}
