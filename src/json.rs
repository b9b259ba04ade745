// Copyright 2026 Omnio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The §6.3 JSON codec capability, used to (de)serialize `usermeta`.

use serde_json::Value;

use crate::error::Result;

pub trait JsonCodec: Send + Sync {
    fn parse(&self, text: &str) -> Result<Value>;
    fn stringify(&self, value: &Value) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn parse(&self, text: &str) -> Result<Value> {
        Ok(serde_json::from_str(text)?)
    }

    fn stringify(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_user_defined_equality() {
        let codec = SerdeJsonCodec;
        let value = json!({"a": 1, "b": [1, 2, 3]});
        let text = codec.stringify(&value).unwrap();
        let parsed = codec.parse(&text).unwrap();
        assert_eq!(value, parsed);
    }
}
