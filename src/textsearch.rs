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

//! The `TextSearch` normaliser: `to_query_string`/`from_query_string`
//! form an inverse pair over object descriptions. The default
//! implementation is the identity pair.

pub trait TextSearch: Send + Sync {
    fn to_query_string(&self, s: &str) -> String;
    fn from_query_string(&self, s: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTextSearch;

impl TextSearch for IdentityTextSearch {
    fn to_query_string(&self, s: &str) -> String {
        s.to_string()
    }

    fn from_query_string(&self, s: &str) -> String {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let ts = IdentityTextSearch;
        let s = "foo foo foo bar baz";
        assert_eq!(ts.from_query_string(&ts.to_query_string(s)), s);
    }
}
