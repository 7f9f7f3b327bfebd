// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Streaming heavy hitters with bounded memory and local differential privacy.
//!
//! This crate provides:
//!
//! * [`guardian`]: the Guardian sketch, a bucketed frequency counter with a fixed number of
//!   cells that probabilistically evicts infrequent items.
//! * [`counter`]: the counting interface shared by the sketch and an exact map.
//! * [`ldp`]: randomized-response parameters, a warm-up/statistics/cleanup session that
//!   debiases randomized reports into top-k estimates, and a reporting-side client.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(missing_docs)]

pub mod counter;
pub mod error;
pub mod guardian;
pub mod ldp;

mod hash;
