// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 请求数据传输对象
pub mod task_request;

/// 响应数据传输对象
pub mod task_response;
