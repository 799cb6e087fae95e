// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 错误处理
pub mod errors;

/// HTTP处理器
pub mod handlers;

/// 路由定义
pub mod routes;
